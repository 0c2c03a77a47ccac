// Error handling for the map pipeline

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MapError>;

#[derive(Error, Debug)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Unsupported image header length: {0}")]
    UnsupportedFormat(u16),

    #[error("Invalid map entity: {0}")]
    InvalidEntity(String),

    #[error("Invalid map layer: {0}")]
    InvalidLayer(String),

    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MapError {
    pub(crate) fn truncated(what: &str, need: usize, have: usize) -> Self {
        MapError::MalformedInput(format!("{what}: need {need} bytes, have {have}"))
    }
}
