// Format constants for the "rr" vacuum map dump

pub const MAGIC: &[u8; 2] = b"rr";

// File header: magic(2) hlen(u16) dlen(u32) major(u16) minor(u16) map_index(u32) map_sequence(u32)
pub const FILE_HEADER_SIZE: usize = 2 + 2 + 4 + 2 + 2 + 4 + 4; // 0x14 bytes

// Block metadata: type(u16) hlen(u16) dlen(u32)
pub const BLOCK_META_SIZE: usize = 2 + 2 + 4; // 8 bytes

// Image block header lengths
pub const IMAGE_HEADER_LEGACY: u16 = 24;
pub const IMAGE_HEADER_SEGMENTS: u16 = 28;

// Path point data always starts here, regardless of the declared header length
pub const PATH_POINTS_OFFSET: usize = 0x14;

/// Edge length of the vendor map image in pixels.
pub const DIMENSION_PIXELS: i32 = 1024;
/// Edge length of the vendor map in raw map units (mm).
pub const DIMENSION_MM: i32 = 50 * 1024;

pub const MAP_SIZE: i32 = 5120;
pub const PIXEL_SIZE: u32 = 5;

// Version of the decoded Map structure itself
pub const MAP_FORMAT_VERSION: u32 = 2;

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlockType {
    ChargerLocation = 1,
    Image = 2,
    Path = 3,
    GotoPath = 4,
    GotoPredictedPath = 5,
    CurrentlyCleanedZones = 6,
    GotoTarget = 7,
    RobotPosition = 8,
    NoGoAreas = 9,
    VirtualWalls = 10,
    CurrentlyCleanedSegments = 11,
    NoMopAreas = 12,
    Digest = 1024,
}

const BLOCK_TYPES: [(u16, BlockType); 13] = [
    (1, BlockType::ChargerLocation),
    (2, BlockType::Image),
    (3, BlockType::Path),
    (4, BlockType::GotoPath),
    (5, BlockType::GotoPredictedPath),
    (6, BlockType::CurrentlyCleanedZones),
    (7, BlockType::GotoTarget),
    (8, BlockType::RobotPosition),
    (9, BlockType::NoGoAreas),
    (10, BlockType::VirtualWalls),
    (11, BlockType::CurrentlyCleanedSegments),
    (12, BlockType::NoMopAreas),
    (1024, BlockType::Digest),
];

impl BlockType {
    pub fn from_u16(val: u16) -> Option<Self> {
        BLOCK_TYPES
            .iter()
            .find(|(code, _)| *code == val)
            .map(|(_, ty)| *ty)
    }

    pub fn code(self) -> u16 {
        self as u16
    }
}
