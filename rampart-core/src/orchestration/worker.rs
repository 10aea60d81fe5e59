use std::{sync::Arc, time::Duration};

use tracing::{debug, warn};

use super::{
    engine::ScanEngine,
    job::{ScanJob, Step},
};

/// Drive one job until it is stopped or its frontier is exhausted.
///
/// Every iteration dispatches at most one unit and checks the stop token and
/// pause flag first, so a stop is honoured before the next request goes out.
pub(crate) async fn run_job(
    job: Arc<ScanJob>,
    engine: Arc<dyn ScanEngine>,
    request_delay: Option<Duration>,
) {
    let id = job.id();
    let cancel = job.cancellation().clone();
    let ctx = job.context();

    let plan = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(target: "rampart::worker", scan_id = %id, "stopped before planning");
            return;
        }
        plan = engine.plan(job.target(), &ctx) => plan,
    };
    match plan {
        Ok(units) => job.seed(units),
        Err(err) => {
            warn!(
                target: "rampart::worker",
                scan_id = %id,
                error = %err,
                "planning failed; scan will finish without work"
            );
            job.record_error(&err);
        }
    }

    loop {
        // One unit per turn, even when the engine never returns Pending.
        tokio::task::yield_now().await;
        if cancel.is_cancelled() {
            break;
        }

        // Register for the resume signal before looking at the state so a
        // resume landing in between is not missed.
        let resumed = job.resume_signal().notified();
        tokio::pin!(resumed);
        resumed.as_mut().enable();

        let unit = match job.next_step() {
            Step::Dispatch(unit) => unit,
            Step::Skipped => continue,
            Step::Done => break,
            Step::Wait => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = &mut resumed => {}
                }
                continue;
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = engine.dispatch(&unit, &ctx) => outcome,
        };
        job.apply_outcome(&unit, outcome);

        if let Some(delay) = request_delay {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    debug!(
        target: "rampart::worker",
        scan_id = %id,
        state = %job.state(),
        "scan worker exited"
    );
}
