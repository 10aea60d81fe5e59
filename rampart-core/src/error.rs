use rampart_model::{Mode, ScanId, ScanState};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    /// The mode policy gate rejected a scan before anything was created.
    #[error("scan not allowed in {mode} mode: {reason}")]
    PolicyDenied {
        mode: Mode,
        target: Option<String>,
        reason: String,
    },

    #[error("scan {0} not found")]
    NotFound(ScanId),

    #[error("scan {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: ScanId,
        from: ScanState,
        to: ScanState,
    },

    #[error("invalid exclude pattern '{pattern}'")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("engine error: {0}")]
    Engine(#[source] anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScanError {
    pub fn is_policy_denied(&self) -> bool {
        matches!(self, ScanError::PolicyDenied { .. })
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
