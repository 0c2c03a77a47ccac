use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn, Level};

mod models;
mod utils;

use crate::models::pipeline_model::PipelineConfig;
use crate::utils::conf_helper::init_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    // === CONFIG ===
    let config = init_config()
        .await
        .map_err(anyhow::Error::msg)
        .context("config init failed")?;

    let paths: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        anyhow::bail!("usage: vacuum_map_reader <map dump>...");
    }

    // Each dump is decoded on its own blocking worker
    let jobs: Vec<_> = paths
        .into_iter()
        .map(|path| {
            let decoder = config.decoder;
            let solver = config.solver;
            let handle = tokio::task::spawn_blocking({
                let path = path.clone();
                move || rrmap::handle_map_file(&path, decoder, &solver)
            });
            (path, handle)
        })
        .collect();

    let mut failures = 0usize;
    for (path, handle) in jobs {
        let result = handle
            .await
            .with_context(|| format!("worker for {} panicked", path.display()))?;

        match result {
            Ok(Some(payload)) => {
                let json = rrmap::payload_to_json(&payload, config.output.pretty)?;
                write_output(config, &path, json).await?;
            }
            Ok(None) => warn!("{}: not a usable map dump", path.display()),
            Err(e) => {
                error!("{}: {}", path.display(), e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} map dump(s) failed to decode");
    }
    Ok(())
}

async fn write_output(config: &PipelineConfig, source: &Path, json: String) -> anyhow::Result<()> {
    let Some(dir) = &config.output.directory else {
        println!("{json}");
        return Ok(());
    };

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating {}", dir.display()))?;

    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "map".to_string());
    let target = dir.join(format!("{stem}.json"));

    tokio::fs::write(&target, json)
        .await
        .with_context(|| format!("writing {}", target.display()))?;
    info!("wrote {}", target.display());
    Ok(())
}
