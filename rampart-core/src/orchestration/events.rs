use rampart_model::ScanEvent;

use super::runtime::EventBus;

/// Bus carrying scan lifecycle and registry events.
pub type ScanEventBus = EventBus<ScanEvent>;

/// Where scan jobs and the registry send their events. Keeps jobs unaware of
/// how (or whether) anything observes them.
pub trait ScanEventSink: Send + Sync {
    fn emit(&self, event: ScanEvent);
}

impl ScanEventSink for ScanEventBus {
    fn emit(&self, event: ScanEvent) {
        tracing::trace!(
            target: "rampart::events",
            scan_id = %event.meta.scan_id,
            sequence = event.meta.sequence,
            kind = event.payload.label(),
            "scan event"
        );
        self.publish(event);
    }
}

/// Sink that drops everything; handy when a job is driven without observers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ScanEventSink for NullSink {
    fn emit(&self, _event: ScanEvent) {}
}
