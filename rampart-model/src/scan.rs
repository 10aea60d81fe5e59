use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::ModelError, identity::Identity, ids::ScanId, target::Target,
};

/// Lifecycle state of a scan job.
///
/// ```text
/// Running <-> Paused
/// Running | Paused -> Stopped   (terminal)
/// Running          -> Finished  (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ScanState {
    Running,
    Paused,
    Stopped,
    Finished,
}

impl ScanState {
    /// Running or paused.
    pub fn is_active(self) -> bool {
        matches!(self, ScanState::Running | ScanState::Paused)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ScanState::Stopped | ScanState::Finished)
    }

    /// Whether the state graph has an edge from `self` to `next`.
    pub fn can_transition_to(self, next: ScanState) -> bool {
        matches!(
            (self, next),
            (ScanState::Running, ScanState::Paused)
                | (ScanState::Paused, ScanState::Running)
                | (ScanState::Running, ScanState::Stopped)
                | (ScanState::Paused, ScanState::Stopped)
                | (ScanState::Running, ScanState::Finished)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScanState::Running => "running",
            ScanState::Paused => "paused",
            ScanState::Stopped => "stopped",
            ScanState::Finished => "finished",
        }
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanState {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "running" => Ok(ScanState::Running),
            "paused" => Ok(ScanState::Paused),
            "stopped" => Ok(ScanState::Stopped),
            "finished" => Ok(ScanState::Finished),
            _ => Err(ModelError::InvalidScanState(s.to_string())),
        }
    }
}

/// Per-host counters, keyed by `host[:port]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HostProgress {
    pub host: String,
    pub dispatched: u64,
    pub pending: usize,
    pub percent: u8,
    pub completed: bool,
}

/// Progress counters for a scan job. Counters only ever grow while the job
/// exists; `pending` shrinks as the frontier drains.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanProgress {
    pub requests_sent: u64,
    pub requests_skipped: u64,
    pub errors: u64,
    pub hosts_processed: usize,
    pub hosts_total: usize,
    pub pending: usize,
    pub percent: u8,
    pub hosts: Vec<HostProgress>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub last_error: Option<String>,
}

/// One row of a scan's result ledger.
///
/// Two records are the same entry when they share `uri` and `method`.
#[derive(Debug, Clone, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanResultRecord {
    pub uri: String,
    pub method: String,
    pub flags: String,
    pub skipped: bool,
}

impl ScanResultRecord {
    pub fn new(
        uri: impl Into<String>,
        method: impl Into<String>,
        flags: impl Into<String>,
        skipped: bool,
    ) -> Self {
        Self {
            uri: uri.into(),
            method: method.into(),
            flags: flags.into(),
            skipped,
        }
    }

    pub fn same_entry(&self, uri: &str, method: &str) -> bool {
        self.uri == uri && self.method == method
    }
}

impl PartialEq for ScanResultRecord {
    fn eq(&self, other: &Self) -> bool {
        self.same_entry(&other.uri, &other.method)
    }
}

impl std::hash::Hash for ScanResultRecord {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
        self.method.hash(state);
    }
}

/// Point-in-time copy of a scan job, safe to hand to any caller.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanSnapshot {
    pub id: ScanId,
    pub correlation_id: Uuid,
    pub name: String,
    pub target: Target,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub owner: Option<Identity>,
    pub state: ScanState,
    pub progress: ScanProgress,
    pub exclude_list: Vec<String>,
    pub result_count: usize,
    pub started_at: DateTime<Utc>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub terminal_at: Option<DateTime<Utc>>,
    pub sequence: u64,
}

impl ScanSnapshot {
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }
}

impl fmt::Debug for ScanSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanSnapshot")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("percent", &self.progress.percent)
            .field("requests_sent", &self.progress.requests_sent)
            .field("pending", &self.progress.pending)
            .field("result_count", &self.result_count)
            .field("owner", &self.owner.as_ref().map(|o| &o.name))
            .field("started_at", &self.started_at)
            .field("terminal_at", &self.terminal_at)
            .field("sequence", &self.sequence)
            .field("correlation_id", &self.correlation_id)
            .finish()
    }
}
