use std::collections::{BTreeMap, HashSet, VecDeque};

use rampart_model::{HostProgress, ScanProgress};

use super::engine::WorkUnit;

#[derive(Debug, Default, Clone)]
struct HostTally {
    enqueued: u64,
    processed: u64,
    dispatched: u64,
    pending: usize,
    started: bool,
    completed: bool,
}

impl HostTally {
    fn percent(&self) -> u8 {
        ratio(self.processed, self.enqueued)
    }
}

fn ratio(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    (done.min(total) * 100 / total) as u8
}

/// Host-level transitions caused by processing one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HostStep {
    pub host: String,
    /// First dispatched unit for this host.
    pub started: bool,
    pub percent: u8,
    /// No units left for this host.
    pub completed: bool,
}

/// Pending work of one scan plus the per-host bookkeeping that survives a
/// pause. Units are unique by `(method, uri)` for the lifetime of the scan.
#[derive(Debug, Default)]
pub(crate) struct Frontier {
    pending: VecDeque<WorkUnit>,
    seen: HashSet<(String, String)>,
    hosts: BTreeMap<String, HostTally>,
    enqueued: u64,
    processed: u64,
}

impl Frontier {
    /// Queue `unit` unless it was queued before. Returns whether it was added.
    pub fn push(&mut self, unit: WorkUnit) -> bool {
        if !self.seen.insert(unit.key()) {
            return false;
        }
        let tally = self.hosts.entry(unit.host.clone()).or_default();
        tally.enqueued += 1;
        tally.pending += 1;
        tally.completed = false;
        self.enqueued += 1;
        self.pending.push_back(unit);
        true
    }

    pub fn extend(&mut self, units: impl IntoIterator<Item = WorkUnit>) -> usize {
        units.into_iter().map(|u| self.push(u)).filter(|added| *added).count()
    }

    pub fn pop(&mut self) -> Option<WorkUnit> {
        self.pending.pop_front()
    }

    /// Account for a popped unit. `dispatched` is false for skipped units.
    pub fn complete(&mut self, host: &str, dispatched: bool) -> HostStep {
        self.processed += 1;
        let tally = self.hosts.entry(host.to_string()).or_default();
        tally.processed += 1;
        tally.pending = tally.pending.saturating_sub(1);

        let started = dispatched && !tally.started;
        if dispatched {
            tally.started = true;
            tally.dispatched += 1;
        }
        let completed = tally.pending == 0 && !tally.completed;
        if completed {
            tally.completed = true;
        }

        HostStep {
            host: host.to_string(),
            started,
            percent: tally.percent(),
            completed,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn percent(&self) -> u8 {
        ratio(self.processed, self.enqueued)
    }

    /// Copy frontier-derived figures into `progress`. The overall percentage
    /// never moves backwards even when new units are discovered.
    pub fn fill(&self, progress: &mut ScanProgress) {
        progress.pending = self.pending.len();
        progress.percent = progress.percent.max(self.percent());
        progress.hosts_total = self.hosts.len();
        progress.hosts_processed =
            self.hosts.values().filter(|t| t.completed).count();
        progress.hosts = self
            .hosts
            .iter()
            .map(|(host, tally)| HostProgress {
                host: host.clone(),
                dispatched: tally.dispatched,
                pending: tally.pending,
                percent: tally.percent(),
                completed: tally.completed,
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(uri: &str) -> WorkUnit {
        WorkUnit::get(uri, true)
    }

    #[test]
    fn duplicate_units_are_ignored() {
        let mut frontier = Frontier::default();
        assert!(frontier.push(unit("https://a.test/")));
        assert!(!frontier.push(unit("https://a.test/")));
        assert!(frontier.push(WorkUnit::new("POST", "https://a.test/", true)));
        assert_eq!(frontier.len(), 2);

        // Still unique after being popped.
        frontier.pop();
        assert!(!frontier.push(unit("https://a.test/")));
    }

    #[test]
    fn host_steps_report_start_and_completion_once() {
        let mut frontier = Frontier::default();
        frontier.extend([unit("https://a.test/1"), unit("https://a.test/2")]);

        let first = frontier.pop().expect("unit");
        let step = frontier.complete(&first.host, true);
        assert!(step.started);
        assert!(!step.completed);
        assert_eq!(step.percent, 50);

        let second = frontier.pop().expect("unit");
        let step = frontier.complete(&second.host, true);
        assert!(!step.started);
        assert!(step.completed);
        assert_eq!(step.percent, 100);
    }

    #[test]
    fn fill_keeps_overall_percent_monotonic() {
        let mut frontier = Frontier::default();
        let mut progress = ScanProgress::default();
        frontier.extend([unit("https://a.test/1"), unit("https://a.test/2")]);

        let u = frontier.pop().expect("unit");
        frontier.complete(&u.host, true);
        frontier.fill(&mut progress);
        assert_eq!(progress.percent, 50);

        // Discovering three more units drops the raw ratio to 2/5.
        let u = frontier.pop().expect("unit");
        frontier.extend([
            unit("https://b.test/1"),
            unit("https://b.test/2"),
            unit("https://b.test/3"),
        ]);
        frontier.complete(&u.host, true);
        assert_eq!(frontier.percent(), 40);

        frontier.fill(&mut progress);
        assert_eq!(progress.percent, 50);
        assert_eq!(progress.pending, 3);
        assert_eq!(progress.hosts_total, 2);
        assert_eq!(progress.hosts_processed, 1);
    }
}
