use std::{collections::BTreeMap, sync::Arc};

use parking_lot::RwLock;
use rampart_model::ScanId;

use super::job::ScanJob;

#[derive(Debug)]
struct RegistryInner {
    next_id: u64,
    jobs: BTreeMap<ScanId, Arc<ScanJob>>,
}

/// Id to job map. Ids come from a counter guarded by the same lock as the
/// map, so they are strictly increasing and never reused, and iteration in key
/// order is also insertion order.
#[derive(Debug)]
pub struct JobRegistry {
    inner: RwLock<RegistryInner>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                next_id: 1,
                jobs: BTreeMap::new(),
            }),
        }
    }

    /// Allocate the next id and register the job `build` makes for it, in
    /// one critical section.
    pub fn insert_with<F>(&self, build: F) -> Arc<ScanJob>
    where
        F: FnOnce(ScanId) -> ScanJob,
    {
        let mut inner = self.inner.write();
        let id = ScanId(inner.next_id);
        inner.next_id += 1;
        let job = Arc::new(build(id));
        inner.jobs.insert(id, Arc::clone(&job));
        job
    }

    pub fn get(&self, id: ScanId) -> Option<Arc<ScanJob>> {
        self.inner.read().jobs.get(&id).cloned()
    }

    pub fn remove(&self, id: ScanId) -> Option<Arc<ScanJob>> {
        self.inner.write().jobs.remove(&id)
    }

    /// Remove every job matching `pred`, returning them in id order.
    pub fn remove_where<F>(&self, mut pred: F) -> Vec<Arc<ScanJob>>
    where
        F: FnMut(&ScanJob) -> bool,
    {
        let mut inner = self.inner.write();
        let ids: Vec<ScanId> = inner
            .jobs
            .iter()
            .filter(|(_, job)| pred(job))
            .map(|(id, _)| *id)
            .collect();
        ids.into_iter()
            .filter_map(|id| inner.jobs.remove(&id))
            .collect()
    }

    pub fn drain(&self) -> Vec<Arc<ScanJob>> {
        self.drain_with(|_| {})
    }

    /// Remove every job, calling `before` on each while it is still
    /// registered. Nothing can look a job up between `before` and removal.
    pub fn drain_with<F>(&self, mut before: F) -> Vec<Arc<ScanJob>>
    where
        F: FnMut(&ScanJob),
    {
        let mut inner = self.inner.write();
        for job in inner.jobs.values() {
            before(job);
        }
        std::mem::take(&mut inner.jobs).into_values().collect()
    }

    /// Point-in-time list of jobs, in id order.
    pub fn snapshot(&self) -> Vec<Arc<ScanJob>> {
        self.inner.read().jobs.values().cloned().collect()
    }

    /// Job with the greatest id still present.
    pub fn last(&self) -> Option<Arc<ScanJob>> {
        self.inner
            .read()
            .jobs
            .last_key_value()
            .map(|(_, job)| Arc::clone(job))
    }

    pub fn len(&self) -> usize {
        self.inner.read().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().jobs.is_empty()
    }
}
