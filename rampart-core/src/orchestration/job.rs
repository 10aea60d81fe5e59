use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rampart_model::{
    EventMeta, Identity, ScanEvent, ScanEventPayload, ScanId, ScanProgress,
    ScanResultRecord, ScanSnapshot, ScanState, Target,
};
use tokio::{sync::Notify, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    engine::{ContextObject, DispatchOutcome, ScanContext, WorkUnit},
    events::ScanEventSink,
    exclude::ExcludeList,
    frontier::{Frontier, HostStep},
    results::{Recorded, ResultLedger},
};
use crate::error::{Result, ScanError};

/// Mutable part of a job; everything in here changes under one lock so that
/// state, progress and emitted event sequence stay consistent.
struct JobInner {
    state: ScanState,
    progress: ScanProgress,
    frontier: Frontier,
    results: ResultLedger,
    exclude: ExcludeList,
    sequence: u64,
    terminal_at: Option<DateTime<Utc>>,
}

/// What the worker should do next.
#[derive(Debug)]
pub(crate) enum Step {
    Dispatch(WorkUnit),
    /// A unit was skipped by the exclude list or scope filter.
    Skipped,
    /// Paused; wait for a resume or stop.
    Wait,
    Done,
}

/// One scan against one target.
///
/// The job is created in `Running` and owns its state machine. Stop, pause and
/// resume only flip state and signal the worker; they never wait for it.
pub struct ScanJob {
    id: ScanId,
    correlation_id: Uuid,
    name: String,
    target: Target,
    owner: Option<Identity>,
    context_objects: Vec<ContextObject>,
    started_at: DateTime<Utc>,
    inner: Mutex<JobInner>,
    resume: Notify,
    cancel: CancellationToken,
    sink: Arc<dyn ScanEventSink>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for ScanJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.try_lock().map(|inner| inner.state);
        f.debug_struct("ScanJob")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &state)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Everything needed to build a job besides its id.
pub(crate) struct JobSpec {
    pub name: String,
    pub target: Target,
    pub owner: Option<Identity>,
    pub context_objects: Vec<ContextObject>,
    pub exclude: ExcludeList,
    pub max_results: usize,
}

impl ScanJob {
    pub(crate) fn new(
        id: ScanId,
        spec: JobSpec,
        sink: Arc<dyn ScanEventSink>,
    ) -> Self {
        Self {
            id,
            correlation_id: Uuid::now_v7(),
            name: spec.name,
            target: spec.target,
            owner: spec.owner,
            context_objects: spec.context_objects,
            started_at: Utc::now(),
            inner: Mutex::new(JobInner {
                state: ScanState::Running,
                progress: ScanProgress::default(),
                frontier: Frontier::default(),
                results: ResultLedger::new(spec.max_results),
                exclude: spec.exclude,
                sequence: 0,
                terminal_at: None,
            }),
            resume: Notify::new(),
            cancel: CancellationToken::new(),
            sink,
            task: Mutex::new(None),
        }
    }

    pub fn id(&self) -> ScanId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn state(&self) -> ScanState {
        self.inner.lock().state
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    pub fn snapshot(&self) -> ScanSnapshot {
        let inner = self.inner.lock();
        ScanSnapshot {
            id: self.id,
            correlation_id: self.correlation_id,
            name: self.name.clone(),
            target: self.target.clone(),
            owner: self.owner.clone(),
            state: inner.state,
            progress: inner.progress.clone(),
            exclude_list: inner.exclude.patterns().to_vec(),
            result_count: inner.results.len(),
            started_at: self.started_at,
            terminal_at: inner.terminal_at,
            sequence: inner.sequence,
        }
    }

    pub fn results(&self) -> Vec<ScanResultRecord> {
        self.inner.lock().results.records().to_vec()
    }

    /// Rows that did not fit into the result ledger.
    pub fn dropped_results(&self) -> u64 {
        self.inner.lock().results.dropped()
    }

    /// Replace the exclude list. Only units dequeued from now on are affected.
    pub fn set_exclude_list(&self, exclude: ExcludeList) {
        let mut inner = self.inner.lock();
        if inner.state.is_active() {
            inner.exclude = exclude;
        }
    }

    pub fn pause(&self) -> Result<ScanState> {
        self.transition(ScanState::Paused)
    }

    pub fn resume(&self) -> Result<ScanState> {
        self.transition(ScanState::Running)
    }

    pub fn stop(&self) -> Result<ScanState> {
        self.transition(ScanState::Stopped)
    }

    /// Move to `next`, returning the previous state.
    pub(crate) fn transition(&self, next: ScanState) -> Result<ScanState> {
        let mut inner = self.inner.lock();
        self.transition_locked(&mut inner, next)
    }

    fn transition_locked(
        &self,
        inner: &mut JobInner,
        next: ScanState,
    ) -> Result<ScanState> {
        let from = inner.state;
        if !from.can_transition_to(next) {
            return Err(ScanError::InvalidTransition {
                id: self.id,
                from,
                to: next,
            });
        }
        inner.state = next;

        let payload = match next {
            ScanState::Paused => ScanEventPayload::Paused,
            ScanState::Running => ScanEventPayload::Resumed,
            ScanState::Stopped => ScanEventPayload::Stopped,
            ScanState::Finished => ScanEventPayload::Finished,
        };
        if next.is_terminal() {
            inner.terminal_at = Some(Utc::now());
            if next == ScanState::Finished {
                inner.progress.percent = 100;
            }
        }
        self.emit_locked(inner, payload);

        match next {
            ScanState::Running => self.resume.notify_waiters(),
            ScanState::Stopped => self.cancel.cancel(),
            _ => {}
        }

        info!(
            target: "rampart::job",
            scan_id = %self.id,
            from = %from,
            to = %next,
            "scan state changed"
        );
        Ok(from)
    }

    fn emit_locked(&self, inner: &mut JobInner, payload: ScanEventPayload) {
        inner.sequence += 1;
        let meta = EventMeta::new(self.id, self.correlation_id, inner.sequence);
        self.sink.emit(ScanEvent::new(meta, payload));
    }

    /// Emit the registry-level `ScanAdded` followed by `Started`.
    pub(crate) fn announce_started(&self) {
        let mut inner = self.inner.lock();
        self.emit_locked(
            &mut inner,
            ScanEventPayload::ScanAdded {
                name: self.name.clone(),
            },
        );
        self.emit_locked(&mut inner, ScanEventPayload::Started);
    }

    /// Emit `ScanRemoved` with whatever state the job ended in.
    pub(crate) fn announce_removed(&self) {
        let mut inner = self.inner.lock();
        let final_state = inner.state;
        self.emit_locked(&mut inner, ScanEventPayload::ScanRemoved { final_state });
    }

    pub(crate) fn context(&self) -> ScanContext {
        ScanContext::new(
            self.id,
            self.correlation_id,
            self.owner.clone(),
            self.context_objects.clone(),
            self.cancel.child_token(),
        )
    }

    pub(crate) fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn resume_signal(&self) -> &Notify {
        &self.resume
    }

    pub(crate) fn attach_task(&self, handle: JoinHandle<()>) {
        *self.task.lock() = Some(handle);
    }

    pub(crate) fn take_task(&self) -> Option<JoinHandle<()>> {
        self.task.lock().take()
    }

    /// Seed the frontier with the engine's plan.
    pub(crate) fn seed(&self, units: Vec<WorkUnit>) {
        let mut inner = self.inner.lock();
        if !inner.state.is_active() {
            return;
        }
        let added = inner.frontier.extend(units);
        let JobInner {
            frontier, progress, ..
        } = &mut *inner;
        frontier.fill(progress);
        debug!(
            target: "rampart::job",
            scan_id = %self.id,
            added,
            pending = frontier.len(),
            "frontier seeded"
        );
    }

    pub(crate) fn record_error(&self, error: &ScanError) {
        let mut inner = self.inner.lock();
        if inner.state.is_active() {
            inner.progress.errors += 1;
            inner.progress.last_error = Some(error.to_string());
        }
    }

    /// Decide the next step. Skipped units are fully accounted for here.
    pub(crate) fn next_step(&self) -> Step {
        let mut inner = self.inner.lock();
        match inner.state {
            ScanState::Paused => return Step::Wait,
            ScanState::Stopped | ScanState::Finished => return Step::Done,
            ScanState::Running => {}
        }

        let Some(unit) = inner.frontier.pop() else {
            // Running with nothing left to do.
            let _ = self.transition_locked(&mut inner, ScanState::Finished);
            return Step::Done;
        };

        let excluded = inner.exclude.is_excluded(&unit.uri);
        let out_of_scope = self.target.in_scope_only() && !unit.in_scope;
        if !excluded && !out_of_scope {
            return Step::Dispatch(unit);
        }

        let flags = if excluded { "excluded" } else { "out_of_scope" };
        debug!(
            target: "rampart::job",
            scan_id = %self.id,
            uri = %unit.uri,
            reason = flags,
            "skipping unit"
        );
        inner.progress.requests_skipped += 1;
        self.record_locked(
            &mut inner,
            ScanResultRecord::new(&unit.uri, &unit.method, flags, true),
        );
        let step = inner.frontier.complete(&unit.host, false);
        self.after_unit_locked(&mut inner, &unit, step);
        Step::Skipped
    }

    /// Apply the result of one dispatched unit. Ignored once the job is no
    /// longer active.
    pub(crate) fn apply_outcome(
        &self,
        unit: &WorkUnit,
        outcome: Result<DispatchOutcome>,
    ) {
        let mut inner = self.inner.lock();
        if !inner.state.is_active() {
            debug!(
                target: "rampart::job",
                scan_id = %self.id,
                uri = %unit.uri,
                "discarding outcome of inactive scan"
            );
            return;
        }

        inner.progress.requests_sent += 1;
        match outcome {
            Ok(outcome) => {
                if self.target.recurse() {
                    inner.frontier.extend(outcome.discovered);
                }
                self.record_locked(
                    &mut inner,
                    ScanResultRecord::new(
                        &unit.uri,
                        &unit.method,
                        outcome.flags,
                        false,
                    ),
                );
            }
            Err(err) => {
                tracing::warn!(
                    target: "rampart::job",
                    scan_id = %self.id,
                    uri = %unit.uri,
                    error = %err,
                    "dispatch failed"
                );
                inner.progress.errors += 1;
                inner.progress.last_error = Some(err.to_string());
            }
        }

        let step = inner.frontier.complete(&unit.host, true);
        self.after_unit_locked(&mut inner, unit, step);
    }

    fn record_locked(&self, inner: &mut JobInner, record: ScanResultRecord) {
        let uri = record.uri.clone();
        let method = record.method.clone();
        let skipped = record.skipped;
        if inner.results.record(record) == Recorded::Dropped {
            return;
        }
        self.emit_locked(
            inner,
            ScanEventPayload::ResultRecorded {
                uri,
                method,
                skipped,
            },
        );
    }

    fn after_unit_locked(
        &self,
        inner: &mut JobInner,
        unit: &WorkUnit,
        step: HostStep,
    ) {
        {
            let JobInner {
                frontier, progress, ..
            } = &mut *inner;
            frontier.fill(progress);
        }

        if step.started {
            self.emit_locked(
                inner,
                ScanEventPayload::HostStarted {
                    host: step.host.clone(),
                },
            );
        }
        self.emit_locked(
            inner,
            ScanEventPayload::HostProgressed {
                host: step.host.clone(),
                percent: step.percent,
                uri: unit.uri.clone(),
            },
        );
        if step.completed {
            self.emit_locked(
                inner,
                ScanEventPayload::HostCompleted { host: step.host },
            );
        }
        let percent = inner.progress.percent;
        self.emit_locked(inner, ScanEventPayload::Progressed { percent });
    }
}
