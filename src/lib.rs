// Vacuum map reader
// Decodes "rr" map dumps and colors their segments

pub mod core;

// Re-export main types
pub use crate::core::data_handle::{build_payload, handle_map_file, payload_to_json, MapPayload, SolverOptions};
pub use crate::core::error::{MapError, Result};
pub use crate::core::format::{
    LayerType, LineType, Map, MapEntity, MapLayer, PathType, PointType, PolygonType,
};
pub use crate::core::reader::{DecoderOptions, DuplicateBlockPolicy, MapReader};
pub use crate::core::solver::{Color, MapAreaGraph, MapAreaVertex, SegmentColorSolver, SegmentId};

#[cfg(test)]
mod tests {
    #[test]
    fn test_constants() {
        use crate::core::constants::*;
        assert_eq!(MAGIC, b"rr");
        assert_eq!(BlockType::Image.code(), 2);
    }
}
