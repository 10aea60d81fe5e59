use std::sync::Arc;

use parking_lot::Mutex;
use rampart_core::orchestration::{Listener, ScanOrchestrator};
use rampart_model::{ScanEvent, ScanId};

/// Listener that keeps every event it sees.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<ScanEvent>>,
}

impl EventLog {
    pub fn attach(orchestrator: &ScanOrchestrator) -> Arc<Self> {
        let log = Arc::new(Self::default());
        orchestrator.register_listener(log.clone());
        log
    }

    /// Payload labels seen for `id`, in delivery order.
    pub fn labels_for(&self, id: ScanId) -> Vec<&'static str> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.scan_id() == id)
            .map(|event| event.payload.label())
            .collect()
    }

    pub fn sequences_for(&self, id: ScanId) -> Vec<u64> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.scan_id() == id)
            .map(|event| event.meta.sequence)
            .collect()
    }

    pub fn count(&self, id: ScanId, label: &str) -> usize {
        self.labels_for(id).iter().filter(|l| **l == label).count()
    }
}

impl Listener<ScanEvent> for EventLog {
    fn on_event(&self, event: &ScanEvent) -> anyhow::Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "event-log"
    }
}
