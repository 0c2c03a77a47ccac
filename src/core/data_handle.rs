use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::core::compression::gunzip_if_needed;
use crate::core::error::Result;
use crate::core::format::Map;
use crate::core::reader::{DecoderOptions, MapReader};
use crate::core::solver::{Color, SegmentColorSolver, SegmentId};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolverOptions {
    /// Physical robot footprint used to derive the sampling stride.
    pub robot_size_cm: f64,
    /// Fixed stride in pixels, overrides the derived one.
    pub resolution: Option<f64>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            robot_size_cm: 6.0,
            resolution: None,
        }
    }
}

impl SolverOptions {
    pub fn resolution_for(&self, pixel_size: u32) -> f64 {
        if let Some(resolution) = self.resolution {
            return resolution.max(1.0);
        }
        if pixel_size == 0 {
            return 1.0;
        }
        (self.robot_size_cm / f64::from(pixel_size)).max(1.0)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapPayload {
    pub map: Map,
    pub segment_colors: BTreeMap<SegmentId, Color>,
    pub palette_size: usize,
}

/// Runs a raw (optionally gzipped) map dump through decoding and coloring.
///
/// `Ok(None)` when the dump is not a map this crate understands or has
/// nothing to draw.
pub fn build_payload(
    bytes: &[u8],
    decoder: DecoderOptions,
    solver: &SolverOptions,
) -> Result<Option<MapPayload>> {
    let raw = gunzip_if_needed(bytes)?;

    let Some(map) = MapReader::new(decoder).decode(&raw)? else {
        warn!("no usable map in {} byte dump", bytes.len());
        return Ok(None);
    };

    let resolution = solver.resolution_for(map.pixel_size());
    let colors = SegmentColorSolver::new(map.segment_layers(), resolution);

    let payload = MapPayload {
        segment_colors: colors.colors(),
        palette_size: colors.palette_size(),
        map,
    };

    info!(
        "map {} ready: {} segments, palette of {}",
        payload.map.meta_data().vendor_map_id,
        payload.segment_colors.len(),
        payload.palette_size
    );
    Ok(Some(payload))
}

pub fn handle_map_file<P: AsRef<Path>>(
    path: P,
    decoder: DecoderOptions,
    solver: &SolverOptions,
) -> Result<Option<MapPayload>> {
    let path = path.as_ref();
    info!("reading map dump: {}", path.display());
    let bytes = std::fs::read(path)?;
    build_payload(&bytes, decoder, solver)
}

pub fn payload_to_json(payload: &MapPayload, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(payload)?
    } else {
        serde_json::to_string(payload)?
    };
    Ok(json)
}
