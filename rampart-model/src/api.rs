use uuid::Uuid;

use crate::{
    identity::Identity, ids::ScanId, scan::ScanSnapshot, target::Target,
};

/// Request body for starting a scan through the programmatic API.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StartScanRequest {
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<String>,
    pub target: Target,
    #[cfg_attr(feature = "serde", serde(default))]
    pub owner: Option<Identity>,
}

/// Commands that can be issued against an existing scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ScanCommand {
    Pause,
    Resume,
    Stop,
    Remove,
}

/// Request body for scan commands (pause/resume/stop/remove)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanCommandRequest {
    pub scan_id: ScanId,
    pub command: ScanCommand,
}

/// Acknowledge scan command operations
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanCommandAcceptedResponse {
    pub scan_id: ScanId,
    pub correlation_id: Uuid,
    pub command: ScanCommand,
}

/// Response for active-scan listings including total count
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActiveScansResponse {
    pub scans: Vec<ScanSnapshot>,
    pub count: usize,
}

impl ActiveScansResponse {
    pub fn new(scans: Vec<ScanSnapshot>) -> Self {
        let count = scans.len();
        Self { scans, count }
    }
}
