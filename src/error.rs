// src/error.rs

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PlanLoadError {
    #[error("failed to read plan file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("plan is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("plan failed schema validation: {}", .0.join("; "))]
    Schema(Vec<String>),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {name} has invalid value {value:?}: {reason}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("configuration is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
