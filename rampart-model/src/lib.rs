//! Core data model definitions shared across Rampart crates.
#![allow(missing_docs)]

pub mod api;
pub mod error;
pub mod events;
pub mod identity;
pub mod ids;
pub mod mode;
pub mod prelude;
pub mod scan;
pub mod target;

// Intentionally curated re-exports for downstream consumers.
pub use api::{
    ActiveScansResponse, ScanCommand, ScanCommandAcceptedResponse,
    ScanCommandRequest, StartScanRequest,
};
pub use error::{ModelError, Result as ModelResult};
pub use events::{EventMeta, ScanEvent, ScanEventPayload};
pub use identity::{Identity, SessionInfo};
pub use ids::ScanId;
pub use mode::Mode;
pub use scan::{
    HostProgress, ScanProgress, ScanResultRecord, ScanSnapshot, ScanState,
};
pub use target::{ContextRef, SiteNode, Target};
