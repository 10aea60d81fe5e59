use std::str::FromStr;

use crate::error::ModelError;

/// Identifier handed out by the orchestrator for every scan job.
///
/// Ids are allocated from a monotonically increasing counter starting at 1
/// and are never reused, even after the job has been removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ScanId(pub u64);

impl ScanId {
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for ScanId {
    fn from(value: u64) -> Self {
        ScanId(value)
    }
}

impl std::fmt::Display for ScanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ScanId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(ScanId)
            .map_err(|_| ModelError::InvalidScanId(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_integers() {
        assert_eq!("42".parse::<ScanId>(), Ok(ScanId(42)));
        assert_eq!(" 7 ".parse::<ScanId>(), Ok(ScanId(7)));
        assert!("-1".parse::<ScanId>().is_err());
        assert!("abc".parse::<ScanId>().is_err());
    }

    #[test]
    fn orders_by_numeric_value() {
        let mut ids = vec![ScanId(3), ScanId(1), ScanId(2)];
        ids.sort();
        assert_eq!(ids, vec![ScanId(1), ScanId(2), ScanId(3)]);
    }
}
