use tokio::fs;
use std::io::ErrorKind;
use std::sync::OnceLock;
use tracing::info;
use crate::models::pipeline_model::PipelineConfig;

static CONFIG_CACHE: OnceLock<PipelineConfig> = OnceLock::new();

const DEFAULT_CONFIG_PATH: &str = "pipeline.json";
const CONFIG_ENV: &str = "RRMAP_CONFIG";

pub fn parse_config(data: &str) -> Result<PipelineConfig, String> {
    serde_json::from_str(data).map_err(|e| format!("JSON Parse Error: {e}"))
}

pub async fn init_config() -> Result<&'static PipelineConfig, String> {
    let file_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let config = match fs::read_to_string(&file_path).await {
        Ok(data) => parse_config(&data)?,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("No config at {file_path}, using defaults");
            PipelineConfig::default()
        }
        Err(e) => return Err(format!("File read Error: {e} {file_path}")),
    };

    CONFIG_CACHE
        .set(config)
        .map_err(|_| "Config already initialized".to_string())?;

    info!("Config initialized from {}", file_path);

    Ok(get_cached_config())
}

pub fn get_cached_config() -> &'static PipelineConfig {
    CONFIG_CACHE.get_or_init(PipelineConfig::default)
}
