// Block scanning and per-block decoding

use crate::core::constants::*;
use crate::core::error::{MapError, Result};
use crate::core::pixel::{PackedPixel, PixelKind};
use std::collections::BTreeMap;
use tracing::debug;

/// Bounds-checked little-endian reads over a byte slice.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ByteView<'a> {
    bytes: &'a [u8],
    what: &'static str,
}

impl<'a> ByteView<'a> {
    pub fn new(bytes: &'a [u8], what: &'static str) -> Self {
        Self { bytes, what }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| MapError::MalformedInput(format!("{}: length overflow", self.what)))?;
        self.bytes
            .get(offset..end)
            .ok_or_else(|| MapError::truncated(self.what, end, self.bytes.len()))
    }

    pub fn u16_at(&self, offset: usize) -> Result<u16> {
        let b = self.slice(offset, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32_at(&self, offset: usize) -> Result<u32> {
        let b = self.slice(offset, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn i32_at(&self, offset: usize) -> Result<i32> {
        Ok(self.u32_at(offset)? as i32)
    }
}

/// One block as found in the buffer, header and data still undecoded.
#[derive(Debug, Clone, Copy)]
pub struct RawBlock<'a> {
    pub type_code: u16,
    pub header_length: u16,
    pub data_length: u32,
    pub view: &'a [u8],
}

impl<'a> RawBlock<'a> {
    pub fn block_type(&self) -> Option<BlockType> {
        BlockType::from_u16(self.type_code)
    }

    fn bytes(&self) -> ByteView<'a> {
        ByteView::new(self.view, "block")
    }

    fn data(&self) -> Result<&'a [u8]> {
        self.bytes()
            .slice(self.header_length as usize, self.data_length as usize)
    }
}

/// Walks a buffer of back-to-back blocks. Stops after the first error.
pub struct BlockScanner<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BlockScanner<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn next_block(&mut self) -> Result<RawBlock<'a>> {
        let rest = ByteView::new(&self.data[self.pos..], "block header");
        let type_code = rest.u16_at(0)?;
        let header_length = rest.u16_at(2)?;
        let data_length = rest.u32_at(4)?;

        if (header_length as usize) < BLOCK_META_SIZE {
            return Err(MapError::MalformedInput(format!(
                "block type {} declares header length {}",
                type_code, header_length
            )));
        }

        let total = header_length as usize + data_length as usize;
        let view = rest.slice(0, total)?;
        self.pos += total;

        Ok(RawBlock {
            type_code,
            header_length,
            data_length,
            view,
        })
    }
}

impl<'a> Iterator for BlockScanner<'a> {
    type Item = Result<RawBlock<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }
        let block = self.next_block();
        if block.is_err() {
            self.pos = self.data.len();
        }
        Some(block)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePosition {
    pub top: i32,
    pub left: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub height: i32,
    pub width: i32,
}

/// Flat `[x, y, ...]` pixel lists split by meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImagePixels {
    pub floor: Vec<i32>,
    pub obstacle_strong: Vec<i32>,
    pub segments: BTreeMap<u8, Vec<i32>>,
}

impl ImagePixels {
    pub fn is_empty(&self) -> bool {
        self.floor.is_empty() && self.obstacle_strong.is_empty() && self.segments.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlock {
    pub segment_count: Option<i32>,
    pub position: ImagePosition,
    pub dimensions: ImageDimensions,
    pub pixels: ImagePixels,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathBlock {
    pub current_angle: u32,
    pub points: Vec<[u16; 2]>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedBlock {
    Position { position: [u16; 2], angle: Option<i32> },
    Image(ImageBlock),
    Path(PathBlock),
    Target([u16; 2]),
    Rectangles(Vec<[u16; 4]>),
    Polygons(Vec<[u16; 8]>),
    Segments(Vec<u8>),
}

/// `Ok(None)` means the block carried nothing worth keeping.
pub type BlockDecoder = fn(&RawBlock) -> Result<Option<ParsedBlock>>;

pub fn decoder_for(block_type: BlockType) -> BlockDecoder {
    match block_type {
        BlockType::RobotPosition | BlockType::ChargerLocation => decode_position,
        BlockType::Image => decode_image,
        BlockType::Path | BlockType::GotoPath | BlockType::GotoPredictedPath => decode_path,
        BlockType::GotoTarget => decode_target,
        BlockType::CurrentlyCleanedZones | BlockType::VirtualWalls => decode_rectangles,
        BlockType::NoGoAreas | BlockType::NoMopAreas => decode_polygons,
        BlockType::CurrentlyCleanedSegments => decode_segments,
        BlockType::Digest => decode_skipped,
    }
}

fn decode_position(raw: &RawBlock) -> Result<Option<ParsedBlock>> {
    let b = raw.bytes();
    let position = [b.u16_at(0x08)?, b.u16_at(0x0c)?];
    // Vendor angles turn the other way round
    let angle = if raw.data_length >= 12 {
        Some(b.i32_at(0x10)?.wrapping_neg())
    } else {
        None
    };
    Ok(Some(ParsedBlock::Position { position, angle }))
}

fn decode_image(raw: &RawBlock) -> Result<Option<ParsedBlock>> {
    let has_segments = match raw.header_length {
        IMAGE_HEADER_LEGACY => false,
        IMAGE_HEADER_SEGMENTS => true,
        other => return Err(MapError::UnsupportedFormat(other)),
    };

    let b = raw.bytes();
    // Newer firmware squeezes a segment count in front of the legacy fields
    let (segment_count, fields) = if has_segments {
        (Some(b.i32_at(0x08)?), ByteView::new(b.slice(4, b.len() - 4)?, "image header"))
    } else {
        (None, b)
    };

    let dimensions = ImageDimensions {
        height: fields.i32_at(0x10)?,
        width: fields.i32_at(0x14)?,
    };
    let mut position = ImagePosition {
        top: fields.i32_at(0x08)?,
        left: fields.i32_at(0x0c)?,
    };
    // Rows are stored bottom-up
    position.top = DIMENSION_PIXELS
        .checked_sub(position.top)
        .and_then(|v| v.checked_sub(dimensions.height))
        .ok_or_else(|| MapError::MalformedInput("image origin out of range".to_string()))?;

    let mut pixels = ImagePixels::default();
    if dimensions.height > 0 && dimensions.width > 0 {
        let width = dimensions.width as usize;
        let height = dimensions.height as usize;
        let count = width
            .checked_mul(height)
            .ok_or_else(|| MapError::MalformedInput("image dimensions overflow".to_string()))?;
        let data = raw.data()?;
        if data.len() < count {
            return Err(MapError::truncated("image pixels", count, data.len()));
        }

        for (i, byte) in data[..count].iter().enumerate() {
            let px = PackedPixel(*byte);
            if px.is_blank() {
                continue;
            }
            let (Some(x), Some(y)) = (
                ((i % width) as i32).checked_add(position.left),
                ((height - 1 - i / width) as i32).checked_add(position.top),
            ) else {
                return Err(MapError::MalformedInput("image pixel out of range".to_string()));
            };

            match px.kind() {
                PixelKind::Empty => {}
                PixelKind::ObstacleStrong => pixels.obstacle_strong.extend([x, y]),
                PixelKind::Floor => match px.segment_id(has_segments) {
                    None => pixels.floor.extend([x, y]),
                    Some(id) => pixels.segments.entry(id).or_default().extend([x, y]),
                },
            }
        }
    }

    debug!(
        "image block {}x{} at ({}, {}): {} floor, {} wall, {} segments",
        dimensions.width,
        dimensions.height,
        position.left,
        position.top,
        pixels.floor.len() / 2,
        pixels.obstacle_strong.len() / 2,
        pixels.segments.len()
    );

    Ok(Some(ParsedBlock::Image(ImageBlock {
        segment_count,
        position,
        dimensions,
        pixels,
    })))
}

fn decode_path(raw: &RawBlock) -> Result<Option<ParsedBlock>> {
    let b = raw.bytes();
    let current_angle = b.u32_at(0x10)?;
    let mut points = Vec::with_capacity(raw.data_length as usize / 4);
    for i in (0..raw.data_length as usize).step_by(4) {
        let offset = PATH_POINTS_OFFSET + i;
        points.push([b.u16_at(offset)?, b.u16_at(offset + 2)?]);
    }
    Ok(Some(ParsedBlock::Path(PathBlock {
        current_angle,
        points,
    })))
}

fn decode_target(raw: &RawBlock) -> Result<Option<ParsedBlock>> {
    let b = raw.bytes();
    Ok(Some(ParsedBlock::Target([b.u16_at(0x08)?, b.u16_at(0x0a)?])))
}

fn read_tuples<const N: usize>(raw: &RawBlock) -> Result<Option<Vec<[u16; N]>>> {
    let b = raw.bytes();
    let count = b.u32_at(0x08)? as usize;
    if count == 0 {
        return Ok(None);
    }

    let stride = N * 2;
    let needed = count
        .checked_mul(stride)
        .ok_or_else(|| MapError::MalformedInput("tuple count overflow".to_string()))?;
    b.slice(0x0c, needed)?;

    let mut tuples = Vec::with_capacity(count);
    for k in 0..count {
        let base = 0x0c + k * stride;
        let mut tuple = [0u16; N];
        for (j, v) in tuple.iter_mut().enumerate() {
            *v = b.u16_at(base + j * 2)?;
        }
        tuples.push(tuple);
    }
    Ok(Some(tuples))
}

fn decode_rectangles(raw: &RawBlock) -> Result<Option<ParsedBlock>> {
    Ok(read_tuples::<4>(raw)?.map(ParsedBlock::Rectangles))
}

fn decode_polygons(raw: &RawBlock) -> Result<Option<ParsedBlock>> {
    Ok(read_tuples::<8>(raw)?.map(ParsedBlock::Polygons))
}

fn decode_segments(raw: &RawBlock) -> Result<Option<ParsedBlock>> {
    let ids = raw.data()?;
    if ids.is_empty() {
        return Ok(None);
    }
    Ok(Some(ParsedBlock::Segments(ids.to_vec())))
}

fn decode_skipped(raw: &RawBlock) -> Result<Option<ParsedBlock>> {
    debug!("skipping block type {} ({} bytes)", raw.type_code, raw.view.len());
    Ok(None)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Assembles a block: type, header length, data length, header fields, data.
    pub(crate) fn block(type_code: u16, header: &[u8], data: &[u8]) -> Vec<u8> {
        let header_length = (BLOCK_META_SIZE + header.len()) as u16;
        let mut out = Vec::new();
        out.extend_from_slice(&type_code.to_le_bytes());
        out.extend_from_slice(&header_length.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(header);
        out.extend_from_slice(data);
        out
    }

    pub(crate) fn le16(values: &[u16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    pub(crate) fn le32(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn decode_one(bytes: &[u8]) -> Result<Option<ParsedBlock>> {
        let raw = BlockScanner::new(bytes).next().unwrap()?;
        decoder_for(raw.block_type().unwrap())(&raw)
    }

    #[test]
    fn test_scanner_walks_blocks() {
        let mut buf = block(7, &le16(&[100, 200]), &[]);
        buf.extend(block(1024, &[], &[0xAA; 20]));
        let blocks: Vec<_> = BlockScanner::new(&buf).collect::<Result<_>>().unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].block_type(), Some(BlockType::GotoTarget));
        assert_eq!(blocks[1].header_length, 8);
        assert_eq!(blocks[1].data_length, 20);
        assert_eq!(blocks[1].view.len(), 28);
    }

    #[test]
    fn test_scanner_truncated_block() {
        let mut buf = block(7, &le16(&[100, 200]), &[1, 2, 3, 4]);
        buf.truncate(buf.len() - 2);
        let mut scanner = BlockScanner::new(&buf);
        assert!(matches!(scanner.next(), Some(Err(MapError::MalformedInput(_)))));
        assert!(scanner.next().is_none());

        let stub = [7u8, 0, 12];
        assert!(matches!(
            BlockScanner::new(&stub).next(),
            Some(Err(MapError::MalformedInput(_)))
        ));
    }

    #[test]
    fn test_position_with_angle() {
        let buf = block(8, &[], &le32(&[1000, 2000, 90]));
        match decode_one(&buf).unwrap() {
            Some(ParsedBlock::Position { position, angle }) => {
                assert_eq!(position, [1000, 2000]);
                assert_eq!(angle, Some(-90));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_position_without_angle() {
        let buf = block(1, &[], &le16(&[300, 0, 400, 0]));
        match decode_one(&buf).unwrap() {
            Some(ParsedBlock::Position { position, angle }) => {
                assert_eq!(position, [300, 400]);
                assert_eq!(angle, None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_image_legacy_header() {
        // top=10, left=20, height=2, width=3
        let header = le32(&[10, 20, 2, 3]);
        let pixels = [0, 1, 2, 0b00101_011, 0, 0];
        let buf = block(2, &header, &pixels);
        let image = match decode_one(&buf).unwrap() {
            Some(ParsedBlock::Image(image)) => image,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(image.segment_count, None);
        assert_eq!(image.position.top, DIMENSION_PIXELS - 10 - 2);
        let top = image.position.top;
        // row 0 is the bottom row after the flip
        assert_eq!(image.pixels.obstacle_strong, vec![21, top + 1]);
        // segment bits are ignored without the segment header
        assert_eq!(image.pixels.floor, vec![22, top + 1, 20, top]);
        assert!(image.pixels.segments.is_empty());
    }

    #[test]
    fn test_image_segment_header() {
        let header = le32(&[2, 0, 0, 1, 2]);
        let pixels = [0b00011_010, 0b00000_111];
        let buf = block(2, &header, &pixels);
        let image = match decode_one(&buf).unwrap() {
            Some(ParsedBlock::Image(image)) => image,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(image.segment_count, Some(2));
        assert_eq!(image.dimensions, ImageDimensions { height: 1, width: 2 });
        assert_eq!(image.position.top, DIMENSION_PIXELS - 1);
        assert_eq!(image.pixels.segments.get(&3), Some(&vec![0, DIMENSION_PIXELS - 1]));
        assert_eq!(image.pixels.floor, vec![1, DIMENSION_PIXELS - 1]);
    }

    #[test]
    fn test_image_rejects_header_length() {
        let buf = block(2, &le32(&[0, 0, 0, 0, 0, 0]), &[]);
        assert!(matches!(decode_one(&buf), Err(MapError::UnsupportedFormat(32))));
    }

    #[test]
    fn test_image_short_pixels() {
        let buf = block(2, &le32(&[0, 0, 4, 4]), &[1; 10]);
        assert!(matches!(decode_one(&buf), Err(MapError::MalformedInput(_))));
    }

    #[test]
    fn test_path() {
        let mut header = le32(&[2, 4]);
        header.extend(le32(&[0]));
        let buf = block(3, &header, &le16(&[10, 20, 30, 40]));
        match decode_one(&buf).unwrap() {
            Some(ParsedBlock::Path(path)) => {
                assert_eq!(path.current_angle, 0);
                assert_eq!(path.points, vec![[10, 20], [30, 40]]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rectangles_and_polygons() {
        let mut data = le32(&[1]);
        data.extend(le16(&[1, 2, 3, 4]));
        let buf = block(10, &data[..4], &data[4..]);
        assert_eq!(
            decode_one(&buf).unwrap(),
            Some(ParsedBlock::Rectangles(vec![[1, 2, 3, 4]]))
        );

        let mut data = le32(&[1]);
        data.extend(le16(&[1, 2, 3, 4, 5, 6, 7, 8]));
        let buf = block(9, &data[..4], &data[4..]);
        assert_eq!(
            decode_one(&buf).unwrap(),
            Some(ParsedBlock::Polygons(vec![[1, 2, 3, 4, 5, 6, 7, 8]]))
        );

        let buf = block(6, &le32(&[0]), &[]);
        assert_eq!(decode_one(&buf).unwrap(), None);
    }

    #[test]
    fn test_rectangles_count_past_end() {
        let mut data = le32(&[3]);
        data.extend(le16(&[1, 2, 3, 4]));
        let buf = block(6, &data[..4], &data[4..]);
        assert!(matches!(decode_one(&buf), Err(MapError::MalformedInput(_))));
    }

    #[test]
    fn test_segments() {
        let buf = block(11, &le32(&[2]), &[16, 17]);
        assert_eq!(
            decode_one(&buf).unwrap(),
            Some(ParsedBlock::Segments(vec![16, 17]))
        );
        let buf = block(11, &le32(&[0]), &[]);
        assert_eq!(decode_one(&buf).unwrap(), None);
    }
}
