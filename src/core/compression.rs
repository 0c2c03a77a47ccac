// Gzip handling for map dumps fetched from the robot

use crate::core::error::{MapError, Result};
use flate2::read::GzDecoder;
use std::io::Read;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub fn is_gzip(data: &[u8]) -> bool {
    data.len() >= 2 && data[0..2] == GZIP_MAGIC
}

pub fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| MapError::DecompressionFailed(format!("Gzip: {}", e)))?;
    Ok(decompressed)
}

/// Gunzips `data` when it carries the gzip magic, otherwise hands it back as-is.
pub fn gunzip_if_needed(data: &[u8]) -> Result<Vec<u8>> {
    if is_gzip(data) {
        gunzip(data)
    } else {
        Ok(data.to_vec())
    }
}
