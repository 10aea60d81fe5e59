use std::{fmt, sync::Arc};

use futures::future::join_all;
use parking_lot::Mutex;
use rampart_model::{
    Identity, Mode, ScanEvent, ScanId, ScanResultRecord, ScanSnapshot,
    ScanState, SessionInfo, SiteNode, Target,
};
use tokio::{runtime::Handle, sync::broadcast};
use tracing::{debug, info, warn};

use super::{
    engine::{ContextObject, ScanEngine},
    events::{ScanEventBus, ScanEventSink},
    exclude::ExcludeList,
    job::{JobSpec, ScanJob},
    policy::authorize,
    registry::JobRegistry,
    runtime::{Listener, ListenerHandle},
    worker::run_job,
};
use crate::{
    config::OrchestratorConfig,
    error::{Result, ScanError},
};

/// Entry point for starting, controlling and observing scans.
///
/// Lock order is mode, exclude list, registry, job. No lock is held across an
/// await point, and listeners run on their own tasks, so callbacks may call
/// straight back into the orchestrator.
pub struct ScanOrchestrator {
    config: OrchestratorConfig,
    engine: Arc<dyn ScanEngine>,
    mode: Mutex<Mode>,
    exclude: Mutex<ExcludeList>,
    registry: JobRegistry,
    events: Arc<ScanEventBus>,
}

impl fmt::Debug for ScanOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanOrchestrator")
            .field("mode", &*self.mode.lock())
            .field("scans", &self.registry.len())
            .field("events", &self.events)
            .field("config", &self.config)
            .finish()
    }
}

impl ScanOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        engine: Arc<dyn ScanEngine>,
    ) -> Result<Self> {
        config.validate()?;
        let exclude = ExcludeList::lenient(&config.default_exclude_patterns);
        Ok(Self {
            mode: Mutex::new(config.initial_mode),
            exclude: Mutex::new(exclude),
            registry: JobRegistry::new(),
            events: Arc::new(ScanEventBus::new(config.event_channel_capacity)),
            engine,
            config,
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Validate `target` against the current mode, then create, register and
    /// start a job for it.
    ///
    /// The mode stays locked until the job is registered, so a concurrent
    /// switch to [`Mode::Safe`] either rejects this scan or stops it.
    pub fn start_scan(
        &self,
        name: Option<String>,
        target: Target,
        owner: Option<Identity>,
        context: Vec<ContextObject>,
    ) -> Result<ScanId> {
        let mode = self.mode.lock();
        if let Err(err) = authorize(*mode, &target).into_result() {
            info!(
                target: "rampart::orchestrator",
                mode = mode.as_str(),
                target_name = %target.display_name(),
                error = %err,
                "scan rejected by mode policy"
            );
            return Err(err);
        }

        // Without a runtime there is nowhere to run the worker; refuse before
        // anything is registered.
        let runtime = Handle::try_current().map_err(|err| {
            ScanError::Internal(format!("no tokio runtime to run the scan on: {err}"))
        })?;

        let spec = JobSpec {
            name: name.unwrap_or_else(|| target.display_name()),
            target,
            owner,
            context_objects: context,
            exclude: self.exclude.lock().clone(),
            max_results: self.config.max_results_per_scan,
        };
        let sink: Arc<dyn ScanEventSink> = self.events.clone();
        let job = self.registry.insert_with(|id| ScanJob::new(id, spec, sink));
        job.announce_started();

        let handle = runtime.spawn(run_job(
            Arc::clone(&job),
            Arc::clone(&self.engine),
            self.config.request_delay(),
        ));
        job.attach_task(handle);
        drop(mode);

        info!(
            target: "rampart::orchestrator",
            scan_id = %job.id(),
            name = job.name(),
            "Started scan {}",
            job.id()
        );
        Ok(job.id())
    }

    /// Scan everything currently in scope.
    pub fn start_scan_all_in_scope(&self) -> Result<ScanId> {
        self.start_scan(None, Target::all_in_scope(), None, Vec::new())
    }

    /// Scan a single node without descending into its children.
    pub fn start_scan_node(&self, node: SiteNode) -> Result<ScanId> {
        self.start_scan(None, Target::new(node, false), None, Vec::new())
    }

    /// Scan a node and everything below it.
    pub fn start_scan_subtree(&self, node: SiteNode) -> Result<ScanId> {
        self.start_scan(None, Target::new(node, true), None, Vec::new())
    }

    pub fn get_scan(&self, id: ScanId) -> Option<ScanSnapshot> {
        self.registry.get(id).map(|job| job.snapshot())
    }

    pub fn get_all_scans(&self) -> Vec<ScanSnapshot> {
        self.registry
            .snapshot()
            .iter()
            .map(|job| job.snapshot())
            .collect()
    }

    /// Running or paused scans, in id order.
    pub fn get_active_scans(&self) -> Vec<ScanSnapshot> {
        self.registry
            .snapshot()
            .iter()
            .map(|job| job.snapshot())
            .filter(ScanSnapshot::is_active)
            .collect()
    }

    /// Most recently started scan that has not been removed.
    pub fn get_last_scan(&self) -> Option<ScanSnapshot> {
        self.registry.last().map(|job| job.snapshot())
    }

    pub fn scan_results(&self, id: ScanId) -> Option<Vec<ScanResultRecord>> {
        self.registry.get(id).map(|job| job.results())
    }

    pub fn stop_scan(&self, id: ScanId) {
        self.control(id, "stop", ScanJob::stop);
    }

    pub fn pause_scan(&self, id: ScanId) {
        self.control(id, "pause", ScanJob::pause);
    }

    pub fn resume_scan(&self, id: ScanId) {
        self.control(id, "resume", ScanJob::resume);
    }

    /// Stop every active scan. Returns how many were stopped.
    pub fn stop_all_scans(&self) -> usize {
        self.control_all("stop", ScanJob::stop)
    }

    pub fn pause_all_scans(&self) -> usize {
        self.control_all("pause", ScanJob::pause)
    }

    pub fn resume_all_scans(&self) -> usize {
        self.control_all("resume", ScanJob::resume)
    }

    fn control(
        &self,
        id: ScanId,
        action: &'static str,
        op: fn(&ScanJob) -> Result<ScanState>,
    ) -> bool {
        let Some(job) = self.registry.get(id) else {
            debug!(
                target: "rampart::orchestrator",
                scan_id = %id,
                action,
                "scan not found; ignoring"
            );
            return false;
        };
        match op(&job) {
            Ok(_) => true,
            Err(err) => {
                debug!(
                    target: "rampart::orchestrator",
                    scan_id = %id,
                    action,
                    error = %err,
                    "ignoring illegal transition"
                );
                false
            }
        }
    }

    fn control_all(
        &self,
        action: &'static str,
        op: fn(&ScanJob) -> Result<ScanState>,
    ) -> usize {
        let changed = self
            .registry
            .snapshot()
            .iter()
            .filter(|job| op(job).is_ok())
            .count();
        info!(
            target: "rampart::orchestrator",
            action,
            changed,
            "bulk scan operation"
        );
        changed
    }

    /// Stop and remove one scan. Removing an absent id is a no-op.
    pub async fn remove_scan(&self, id: ScanId) -> Option<ScanSnapshot> {
        let Some(job) = self.registry.get(id) else {
            debug!(
                target: "rampart::orchestrator",
                scan_id = %id,
                "scan not found; nothing to remove"
            );
            return None;
        };
        let _ = job.stop();
        let job = self.registry.remove(id)?;
        Some(self.retire(job).await)
    }

    /// Stop and remove every scan.
    pub async fn remove_all_scans(&self) -> usize {
        // Stopped while still registered, so no job is ever detached running.
        let jobs = self.registry.drain_with(|job| {
            let _ = job.stop();
        });
        let removed = join_all(jobs.into_iter().map(|job| self.retire(job)))
            .await
            .len();
        if removed > 0 {
            info!(target: "rampart::orchestrator", removed, "removed all scans");
        }
        removed
    }

    /// Remove finished scans, plus stopped ones unless configured otherwise.
    pub async fn remove_finished_scans(&self) -> usize {
        let include_stopped = self.config.remove_finished_includes_stopped;
        let jobs = self.registry.remove_where(|job| match job.state() {
            ScanState::Finished => true,
            ScanState::Stopped => include_stopped,
            ScanState::Running | ScanState::Paused => false,
        });
        join_all(jobs.into_iter().map(|job| self.retire(job)))
            .await
            .len()
    }

    /// Wait (bounded) for a stopped job's task and announce its removal.
    async fn retire(&self, job: Arc<ScanJob>) -> ScanSnapshot {
        if let Some(handle) = job.take_task() {
            match tokio::time::timeout(self.config.remove_ack_timeout(), handle)
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(
                        target: "rampart::orchestrator",
                        scan_id = %job.id(),
                        error = %err,
                        "scan worker ended abnormally"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "rampart::orchestrator",
                        scan_id = %job.id(),
                        timeout_ms = self.config.remove_ack_timeout_ms,
                        "scan worker did not acknowledge stop; detaching"
                    );
                }
            }
        }
        job.announce_removed();
        info!(
            target: "rampart::orchestrator",
            scan_id = %job.id(),
            "Removed scan {}",
            job.id()
        );
        job.snapshot()
    }

    /// Replace the exclude list of every active scan and of scans started
    /// later. Invalid patterns are skipped.
    pub fn set_exclude_list<S: AsRef<str>>(&self, patterns: &[S]) {
        let list = ExcludeList::lenient(patterns);
        let mut current = self.exclude.lock();
        *current = list.clone();

        let mut applied = 0usize;
        for job in self.registry.snapshot() {
            if job.is_active() {
                job.set_exclude_list(list.clone());
                applied += 1;
            }
        }
        info!(
            target: "rampart::orchestrator",
            patterns = list.patterns().len(),
            applied,
            "exclude list updated"
        );
    }

    pub fn mode(&self) -> Mode {
        *self.mode.lock()
    }

    /// Record a new mode. Entering [`Mode::Safe`] stops every scan before
    /// this returns.
    pub fn handle_mode_change(&self, mode: Mode) {
        let mut current = self.mode.lock();
        let previous = std::mem::replace(&mut *current, mode);
        info!(
            target: "rampart::orchestrator",
            from = %previous,
            to = %mode,
            "mode changed"
        );
        if mode.is_safe() {
            let stopped = self.stop_all_scans();
            if stopped > 0 {
                info!(
                    target: "rampart::orchestrator",
                    stopped,
                    "stopped scans on entering safe mode"
                );
            }
        }
    }

    /// The session is about to be replaced; its scans go with it.
    pub async fn handle_session_about_to_change(&self) {
        let removed = self.remove_all_scans().await;
        debug!(target: "rampart::orchestrator", removed, "session about to change");
    }

    /// A session was loaded (`Some`) or closed (`None`). Only closing clears
    /// the scans; a newly loaded session keeps whatever is registered.
    pub async fn handle_session_changed(&self, session: Option<&SessionInfo>) {
        match session {
            None => {
                let removed = self.remove_all_scans().await;
                debug!(target: "rampart::orchestrator", removed, "session closed");
            }
            Some(session) => {
                info!(
                    target: "rampart::orchestrator",
                    session = %session.name,
                    scans = self.registry.len(),
                    "session changed"
                );
            }
        }
    }

    /// Scope edits do not retarget running scans; their targets are fixed.
    pub fn handle_scope_changed(&self) {
        debug!(
            target: "rampart::orchestrator",
            active = self.get_active_scans().len(),
            "scope changed; running scans keep their targets"
        );
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.events.subscribe()
    }

    pub fn register_listener(
        &self,
        listener: Arc<dyn Listener<ScanEvent>>,
    ) -> ListenerHandle {
        self.events.register_listener(listener)
    }

    /// Stop and remove every scan, then detach all listeners.
    pub async fn shutdown(&self) {
        let removed = self.remove_all_scans().await;
        self.events.shutdown();
        info!(target: "rampart::orchestrator", removed, "orchestrator shut down");
    }
}
