//! Shared helpers for core integration tests.

#![allow(dead_code)]

pub mod engine;
pub mod events;

use std::{sync::Arc, time::Duration};

use rampart_core::{config::OrchestratorConfig, orchestration::ScanOrchestrator};
use rampart_model::{Mode, ScanId, ScanState, SiteNode, Target};

/// Upper bound for any single wait in these tests.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

pub fn orchestrator_with(
    mode: Mode,
    engine: Arc<engine::GatedEngine>,
) -> Arc<ScanOrchestrator> {
    let config = OrchestratorConfig::default().with_initial_mode(mode);
    Arc::new(ScanOrchestrator::new(config, engine).expect("valid config"))
}

pub fn root_target() -> Target {
    Target::new(SiteNode::in_scope("https://app.test/"), true)
}

/// Poll `check` until it holds or [`WAIT_TIMEOUT`] elapses.
pub async fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub async fn wait_for_state(
    orchestrator: &ScanOrchestrator,
    id: ScanId,
    state: ScanState,
) {
    wait_until(&format!("scan {id} to reach {state}"), || {
        orchestrator.get_scan(id).map(|s| s.state) == Some(state)
    })
    .await;
}

pub async fn wait_for_sent(orchestrator: &ScanOrchestrator, id: ScanId, sent: u64) {
    wait_until(&format!("scan {id} to send {sent} requests"), || {
        orchestrator
            .get_scan(id)
            .is_some_and(|s| s.progress.requests_sent >= sent)
    })
    .await;
}
