use rrmap::{DecoderOptions, SolverOptions};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    pub decoder: DecoderOptions,
    pub solver: SolverOptions,
    pub output: OutputConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputConfig {
    pub pretty: bool,
    pub directory: Option<PathBuf>,
}
