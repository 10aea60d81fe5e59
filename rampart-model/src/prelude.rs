//! Caller-facing snapshot of the types surface.
//! Prefer importing from this module when writing presentation or API layers
//! on top of the orchestrator.

pub use super::api::{
    ActiveScansResponse, ScanCommand, ScanCommandAcceptedResponse,
    ScanCommandRequest, StartScanRequest,
};
pub use super::events::{EventMeta, ScanEvent, ScanEventPayload};
pub use super::identity::{Identity, SessionInfo};
pub use super::ids::ScanId;
pub use super::mode::Mode;
pub use super::scan::{
    HostProgress, ScanProgress, ScanResultRecord, ScanSnapshot, ScanState,
};
pub use super::target::{ContextRef, SiteNode, Target};
