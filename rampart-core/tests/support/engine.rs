use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use rampart_core::{
    error::{Result, ScanError},
    orchestration::{DispatchOutcome, ScanContext, ScanEngine, WorkUnit},
};
use rampart_model::Target;
use tokio::sync::Semaphore;

/// Engine whose requests only complete when the test hands out permits.
///
/// `plan` yields `units` pages below the start node; every page links to
/// nothing, so a scan finishes after exactly `units` requests.
#[derive(Debug)]
pub struct GatedEngine {
    units: usize,
    gate: Semaphore,
    dispatched: AtomicU64,
}

impl GatedEngine {
    pub fn new(units: usize) -> Self {
        Self {
            units,
            gate: Semaphore::new(0),
            dispatched: AtomicU64::new(0),
        }
    }

    /// Let `n` more requests through, across all scans.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn open(&self) {
        self.gate.add_permits(1_000_000);
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScanEngine for GatedEngine {
    async fn plan(
        &self,
        target: &Target,
        _ctx: &ScanContext,
    ) -> Result<Vec<WorkUnit>> {
        let base = target
            .start()
            .map(|node| node.path.clone())
            .unwrap_or_else(|| "https://scope.test/".to_string());
        Ok((0..self.units)
            .map(|i| WorkUnit::get(format!("{base}page-{i}"), true))
            .collect())
    }

    async fn dispatch(
        &self,
        unit: &WorkUnit,
        ctx: &ScanContext,
    ) -> Result<DispatchOutcome> {
        tokio::select! {
            _ = ctx.cancellation().cancelled() => {
                Err(ScanError::Cancelled(unit.uri.clone()))
            }
            permit = self.gate.acquire() => {
                permit
                    .map_err(|err| ScanError::Internal(err.to_string()))?
                    .forget();
                self.dispatched.fetch_add(1, Ordering::SeqCst);
                Ok(DispatchOutcome::default())
            }
        }
    }
}
