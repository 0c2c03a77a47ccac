// Bit layout of a single image block pixel byte
//
//   7 6 5 4 3 | 2 1 0
//   segment id| type

const TYPE_MASK: u8 = 0b0000_0111;
const SEGMENT_MASK: u8 = 0b1111_1000;
const SEGMENT_SHIFT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelKind {
    Empty,
    ObstacleStrong,
    Floor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedPixel(pub u8);

impl PackedPixel {
    pub fn is_blank(self) -> bool {
        self.0 == 0
    }

    pub fn type_bits(self) -> u8 {
        self.0 & TYPE_MASK
    }

    pub fn segment_bits(self) -> u8 {
        (self.0 & SEGMENT_MASK) >> SEGMENT_SHIFT
    }

    pub fn kind(self) -> PixelKind {
        match self.type_bits() {
            0 => PixelKind::Empty,
            1 => PixelKind::ObstacleStrong,
            _ => PixelKind::Floor,
        }
    }

    /// Segment the pixel belongs to. Only meaningful for images whose header
    /// carries the segment count field; zero means "plain floor".
    pub fn segment_id(self, has_segments: bool) -> Option<u8> {
        if !has_segments {
            return None;
        }
        match self.segment_bits() {
            0 => None,
            id => Some(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields() {
        let px = PackedPixel(0b10101_011);
        assert_eq!(px.type_bits(), 0b011);
        assert_eq!(px.segment_bits(), 0b10101);
        assert_eq!(px.kind(), PixelKind::Floor);
        assert_eq!(px.segment_id(true), Some(21));
        assert_eq!(px.segment_id(false), None);
    }

    #[test]
    fn test_kinds() {
        assert!(PackedPixel(0).is_blank());
        assert_eq!(PackedPixel(0b00001_000).kind(), PixelKind::Empty);
        assert_eq!(PackedPixel(0b00011_001).kind(), PixelKind::ObstacleStrong);
        assert_eq!(PackedPixel(0b00000_111).segment_id(true), None);
    }
}
