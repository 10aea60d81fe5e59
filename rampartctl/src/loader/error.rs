use std::path::PathBuf;

use rampart_core::error::ScanError;
use rampart_model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read configuration file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration from {origin}: {message}")]
    Parse { origin: String, message: String },
    #[error("invalid RAMPART_MODE value")]
    InvalidMode {
        #[source]
        source: ModelError,
    },
    #[error("configuration rejected: {0}")]
    Invalid(#[source] ScanError),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}
