//! Mode policy gate: decides whether a scan may be created at all.

use rampart_model::{Mode, Target};

use crate::error::ScanError;

/// Outcome of a policy check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Allowed,
    Denied(DenialReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenialReason {
    pub mode: Mode,
    /// Hierarchic name of the offending start node, when one is involved.
    pub node: Option<String>,
    pub message: String,
}

impl Authorization {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Authorization::Allowed)
    }

    /// Convert a denial into the caller-visible error.
    pub fn into_result(self) -> Result<(), ScanError> {
        match self {
            Authorization::Allowed => Ok(()),
            Authorization::Denied(reason) => Err(ScanError::PolicyDenied {
                mode: reason.mode,
                target: reason.node,
                reason: reason.message,
            }),
        }
    }
}

/// Pure function from the current mode and a target to allow/deny.
pub fn authorize(mode: Mode, target: &Target) -> Authorization {
    match mode {
        Mode::Safe => Authorization::Denied(DenialReason {
            mode,
            node: None,
            message: "scans are not allowed in safe mode".to_string(),
        }),
        Mode::Protect => match target.start() {
            Some(node) if !node.in_scope => {
                Authorization::Denied(DenialReason {
                    mode,
                    node: Some(node.path.clone()),
                    message: format!(
                        "scans are not allowed on nodes not in scope in protected mode: {}",
                        node.path
                    ),
                })
            }
            _ => Authorization::Allowed,
        },
        Mode::Standard | Mode::Attack => Authorization::Allowed,
    }
}
