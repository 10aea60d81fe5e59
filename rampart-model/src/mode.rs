use std::{fmt, str::FromStr};

use crate::error::ModelError;

/// Process-wide operating mode restricting which scans may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Mode {
    /// Nothing potentially harmful is allowed; no scan may run.
    Safe,
    /// Scans are limited to nodes inside the session scope.
    Protect,
    /// Scans run against whatever the caller asks for.
    #[default]
    Standard,
    /// Standard, plus new in-scope nodes are attacked as soon as they appear.
    Attack,
}

impl Mode {
    pub const ALL: [Mode; 4] =
        [Mode::Safe, Mode::Protect, Mode::Standard, Mode::Attack];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Safe => "safe",
            Mode::Protect => "protect",
            Mode::Standard => "standard",
            Mode::Attack => "attack",
        }
    }

    pub fn is_safe(self) -> bool {
        matches!(self, Mode::Safe)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "safe" => Ok(Mode::Safe),
            "protect" | "protected" => Ok(Mode::Protect),
            "standard" => Ok(Mode::Standard),
            "attack" => Ok(Mode::Attack),
            _ => Err(ModelError::InvalidMode(s.to_string())),
        }
    }
}
