use std::time::Duration;

use rampart_model::Mode;
use serde::{Deserialize, Serialize};

/// Global knobs that tune orchestrator behaviour.
///
/// All fields carry defaults so deployments can supply partial configuration
/// payloads and pick up new settings progressively.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Mode the orchestrator starts in before any mode-change signal arrives.
    pub initial_mode: Mode,
    /// Capacity of the broadcast channel carrying scan events. Listeners that
    /// fall further behind than this skip events and log how many they lost.
    pub event_channel_capacity: usize,
    /// How long `remove_scan` waits for a stopped job's task to exit before
    /// detaching it. The job is already unable to dispatch or record anything
    /// at that point; this only bounds the wait for acknowledgement.
    pub remove_ack_timeout_ms: u64,
    /// Pause between two dispatched requests of the same scan (0 disables).
    pub request_delay_ms: u64,
    /// Whether `remove_finished_scans` also collects user-stopped scans.
    pub remove_finished_includes_stopped: bool,
    /// Cap on the number of result ledger rows kept per scan.
    pub max_results_per_scan: usize,
    /// Exclude patterns seeded into every new scan until replaced through
    /// `set_exclude_list`.
    pub default_exclude_patterns: Vec<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            initial_mode: Mode::Standard,
            event_channel_capacity: 1_024,
            remove_ack_timeout_ms: 2_000,
            request_delay_ms: 0,
            remove_finished_includes_stopped: true,
            max_results_per_scan: 10_000,
            default_exclude_patterns: Vec::new(),
        }
    }
}

impl OrchestratorConfig {
    pub fn remove_ack_timeout(&self) -> Duration {
        Duration::from_millis(self.remove_ack_timeout_ms)
    }

    pub fn request_delay(&self) -> Option<Duration> {
        (self.request_delay_ms > 0)
            .then(|| Duration::from_millis(self.request_delay_ms))
    }

    pub fn with_initial_mode(mut self, mode: Mode) -> Self {
        self.initial_mode = mode;
        self
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.event_channel_capacity == 0 {
            return Err(crate::error::ScanError::Config(
                "event_channel_capacity must be greater than zero".into(),
            ));
        }
        if self.max_results_per_scan == 0 {
            return Err(crate::error::ScanError::Config(
                "max_results_per_scan must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
