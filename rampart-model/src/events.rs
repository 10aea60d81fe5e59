use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{ids::ScanId, scan::ScanState};

/// Metadata envelope attached to every scan event.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventMeta {
    pub version: u16,
    pub scan_id: ScanId,
    pub correlation_id: Uuid,
    /// Per-scan sequence number, strictly increasing in emission order.
    pub sequence: u64,
    pub emitted_at: DateTime<Utc>,
}

impl EventMeta {
    pub fn new(scan_id: ScanId, correlation_id: Uuid, sequence: u64) -> Self {
        Self {
            version: 1,
            scan_id,
            correlation_id,
            sequence,
            emitted_at: Utc::now(),
        }
    }
}

/// Lifecycle and registry notifications emitted for a scan.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum ScanEventPayload {
    ScanAdded {
        name: String,
    },
    Started,
    Progressed {
        percent: u8,
    },
    HostStarted {
        host: String,
    },
    HostProgressed {
        host: String,
        percent: u8,
        uri: String,
    },
    HostCompleted {
        host: String,
    },
    ResultRecorded {
        uri: String,
        method: String,
        skipped: bool,
    },
    Paused,
    Resumed,
    Stopped,
    Finished,
    ScanRemoved {
        final_state: ScanState,
    },
}

impl ScanEventPayload {
    /// Short label used in logs and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            ScanEventPayload::ScanAdded { .. } => "scan_added",
            ScanEventPayload::Started => "started",
            ScanEventPayload::Progressed { .. } => "progressed",
            ScanEventPayload::HostStarted { .. } => "host_started",
            ScanEventPayload::HostProgressed { .. } => "host_progressed",
            ScanEventPayload::HostCompleted { .. } => "host_completed",
            ScanEventPayload::ResultRecorded { .. } => "result_recorded",
            ScanEventPayload::Paused => "paused",
            ScanEventPayload::Resumed => "resumed",
            ScanEventPayload::Stopped => "stopped",
            ScanEventPayload::Finished => "finished",
            ScanEventPayload::ScanRemoved { .. } => "scan_removed",
        }
    }

    /// Stopped or finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanEventPayload::Stopped | ScanEventPayload::Finished)
    }
}

/// Fully qualified scan event with metadata and payload.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanEvent {
    pub meta: EventMeta,
    pub payload: ScanEventPayload,
}

impl ScanEvent {
    pub fn new(meta: EventMeta, payload: ScanEventPayload) -> Self {
        Self { meta, payload }
    }

    pub fn scan_id(&self) -> ScanId {
        self.meta.scan_id
    }
}
