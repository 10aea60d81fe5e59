use std::fmt::{self, Display};

/// Errors produced by model constructors and parsing routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    InvalidMode(String),
    InvalidScanState(String),
    InvalidScanId(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvalidMode(raw) => {
                write!(f, "invalid mode '{raw}' (expected safe, protect, standard or attack)")
            }
            ModelError::InvalidScanState(raw) => {
                write!(f, "invalid scan state '{raw}'")
            }
            ModelError::InvalidScanId(raw) => {
                write!(f, "invalid scan id '{raw}'")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
