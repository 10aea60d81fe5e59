//! Request/response layer for remote or programmatic callers.
//!
//! Maps the DTOs from `rampart_model::api` onto orchestrator calls and turns
//! failures into a structured [`ApiError`] body.

use std::{fmt, sync::Arc};

use rampart_model::{
    ActiveScansResponse, Mode, ScanCommand, ScanCommandAcceptedResponse,
    ScanCommandRequest, ScanId, ScanResultRecord, ScanSnapshot,
    StartScanRequest,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::ScanError, orchestration::ScanOrchestrator};

/// Error body returned to API callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Stable machine readable code, e.g. `policy_denied`.
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
}

impl ApiError {
    pub const POLICY_DENIED: &'static str = "policy_denied";
    pub const NOT_FOUND: &'static str = "not_found";
    pub const INTERNAL: &'static str = "internal";

    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            mode: None,
        }
    }

    pub fn not_found(id: ScanId) -> Self {
        Self::new(Self::NOT_FOUND, format!("scan {id} not found"))
    }

    pub fn is_policy_denied(&self) -> bool {
        self.code == Self::POLICY_DENIED
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<ScanError> for ApiError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::PolicyDenied { mode, .. } => Self {
                code: Self::POLICY_DENIED.to_string(),
                message: err.to_string(),
                mode: Some(mode),
            },
            ScanError::NotFound(id) => Self::not_found(id),
            other => Self::new(Self::INTERNAL, other.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Thin façade over a shared [`ScanOrchestrator`].
#[derive(Debug, Clone)]
pub struct ScanApi {
    orchestrator: Arc<ScanOrchestrator>,
}

impl ScanApi {
    pub fn new(orchestrator: Arc<ScanOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Arc<ScanOrchestrator> {
        &self.orchestrator
    }

    pub fn start_scan(&self, request: StartScanRequest) -> ApiResult<ScanSnapshot> {
        let id = self.orchestrator.start_scan(
            request.name,
            request.target,
            request.owner,
            Vec::new(),
        )?;
        // A concurrent removal can beat us to the snapshot.
        self.orchestrator
            .get_scan(id)
            .ok_or_else(|| ApiError::not_found(id))
    }

    /// Apply a command to an existing scan. Commands that are not legal in
    /// the scan's current state are accepted and have no effect.
    pub async fn command(
        &self,
        request: ScanCommandRequest,
    ) -> ApiResult<ScanCommandAcceptedResponse> {
        let id = request.scan_id;
        let snapshot = self.scan(id)?;

        match request.command {
            ScanCommand::Pause => self.orchestrator.pause_scan(id),
            ScanCommand::Resume => self.orchestrator.resume_scan(id),
            ScanCommand::Stop => self.orchestrator.stop_scan(id),
            ScanCommand::Remove => {
                if self.orchestrator.remove_scan(id).await.is_none() {
                    return Err(ApiError::not_found(id));
                }
            }
        }
        debug!(
            target: "rampart::api",
            scan_id = %id,
            command = ?request.command,
            "scan command accepted"
        );

        Ok(ScanCommandAcceptedResponse {
            scan_id: id,
            correlation_id: snapshot.correlation_id,
            command: request.command,
        })
    }

    pub fn scan(&self, id: ScanId) -> ApiResult<ScanSnapshot> {
        self.orchestrator
            .get_scan(id)
            .ok_or_else(|| ScanError::NotFound(id).into())
    }

    pub fn scan_results(&self, id: ScanId) -> ApiResult<Vec<ScanResultRecord>> {
        self.orchestrator
            .scan_results(id)
            .ok_or_else(|| ApiError::not_found(id))
    }

    pub fn active_scans(&self) -> ActiveScansResponse {
        ActiveScansResponse::new(self.orchestrator.get_active_scans())
    }
}
