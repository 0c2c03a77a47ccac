// Example usage of the map reader: decode a dump and print its segment colors

use rrmap::core::compression::gunzip_if_needed;
use rrmap::{LayerType, MapReader, Result, SegmentColorSolver, SolverOptions};
use tracing::{debug, info, Level};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "data/map.gz".to_string());

    // Dumps come gzipped straight from the robot
    let bytes = gunzip_if_needed(&std::fs::read(&path)?)?;

    let Some(map) = MapReader::default().decode(&bytes)? else {
        info!("{} is not a usable map dump", path);
        return Ok(());
    };

    info!("Map {} ({} cm per pixel):", map.meta_data().vendor_map_id, map.pixel_size());
    for layer in map.layers() {
        match layer.layer_type() {
            LayerType::Segment => info!(
                "  segment {:?}: {} cm², active={:?}",
                layer.segment_id(),
                layer.area(),
                layer.meta_data().active
            ),
            other => info!("  {:?}: {} cm²", other, layer.area()),
        }
    }
    for entity in map.entities() {
        debug!("  entity with {} points", entity.points().len() / 2);
    }

    let resolution = SolverOptions::default().resolution_for(map.pixel_size());
    let solver = SegmentColorSolver::new(map.segment_layers(), resolution);

    info!("\nPalette needs {} colors:", solver.palette_size());
    for (segment, color) in solver.colors() {
        info!("  segment {} -> color {}", segment, color);
    }

    Ok(())
}
