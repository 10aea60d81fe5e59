//! Boundary to the crawling/attack logic. The orchestrator decides how many
//! jobs run and in what state; an engine decides what one unit of work does.

use std::{any::Any, fmt, sync::Arc};

use async_trait::async_trait;
use rampart_model::{Identity, ScanId, Target};
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use crate::error::Result;

/// Opaque, caller supplied object forwarded untouched to the engine.
pub type ContextObject = Arc<dyn Any + Send + Sync>;

/// One dispatchable unit of work, typically a single HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkUnit {
    /// `host[:port]` the request goes to; progress is tracked per host.
    pub host: String,
    pub method: String,
    pub uri: String,
    /// Whether the scope subsystem considers `uri` in scope.
    pub in_scope: bool,
}

impl WorkUnit {
    pub fn new(
        method: impl Into<String>,
        uri: impl Into<String>,
        in_scope: bool,
    ) -> Self {
        let uri = uri.into();
        Self {
            host: host_key(&uri),
            method: method.into(),
            uri,
            in_scope,
        }
    }

    pub fn get(uri: impl Into<String>, in_scope: bool) -> Self {
        Self::new("GET", uri, in_scope)
    }

    pub(crate) fn key(&self) -> (String, String) {
        (self.method.clone(), self.uri.clone())
    }
}

/// `host:port` for absolute URLs, the raw input otherwise.
pub fn host_key(uri: &str) -> String {
    match Url::parse(uri) {
        Ok(url) => match (url.host_str(), url.port_or_known_default()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            _ => uri.to_string(),
        },
        Err(_) => uri.to_string(),
    }
}

/// What came back from dispatching one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Newly found units; only followed when the target recurses.
    pub discovered: Vec<WorkUnit>,
    /// Free-form annotation stored in the result ledger.
    pub flags: String,
}

/// Per-scan execution context handed to every engine call.
#[derive(Clone)]
pub struct ScanContext {
    scan_id: ScanId,
    correlation_id: Uuid,
    owner: Option<Identity>,
    objects: Arc<[ContextObject]>,
    cancel: CancellationToken,
}

impl fmt::Debug for ScanContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanContext")
            .field("scan_id", &self.scan_id)
            .field("correlation_id", &self.correlation_id)
            .field("owner", &self.owner)
            .field("objects", &self.objects.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl ScanContext {
    pub fn new(
        scan_id: ScanId,
        correlation_id: Uuid,
        owner: Option<Identity>,
        objects: Vec<ContextObject>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            scan_id,
            correlation_id,
            owner,
            objects: objects.into(),
            cancel,
        }
    }

    pub fn scan_id(&self) -> ScanId {
        self.scan_id
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn owner(&self) -> Option<&Identity> {
        self.owner.as_ref()
    }

    pub fn objects(&self) -> &[ContextObject] {
        &self.objects
    }

    /// First context object of type `T`, if any.
    pub fn object<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.objects.iter().find_map(|obj| obj.downcast_ref::<T>())
    }

    /// Token cancelled when the scan is stopped or removed. Engines doing
    /// long I/O should race it.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Contract implemented by whatever actually crawls or attacks a target.
#[async_trait]
pub trait ScanEngine: Send + Sync {
    /// Seed the frontier for `target`.
    async fn plan(
        &self,
        target: &Target,
        ctx: &ScanContext,
    ) -> Result<Vec<WorkUnit>>;

    /// Perform exactly one unit of work.
    async fn dispatch(
        &self,
        unit: &WorkUnit,
        ctx: &ScanContext,
    ) -> Result<DispatchOutcome>;
}
