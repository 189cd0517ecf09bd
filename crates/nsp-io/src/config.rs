//! TOML configuration loading.

use anyhow::{Context, Result};
use nsp_algo::PredictorConfig;
use std::path::Path;

/// Read and validate a predictor configuration; `None` yields the defaults
pub fn load_config(path: Option<&Path>) -> Result<PredictorConfig> {
    let config = match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => PredictorConfig::default(),
    };
    config.validate()?;
    Ok(config)
}
