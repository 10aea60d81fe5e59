use rampart_model::ScanResultRecord;

/// Per-scan list of what was requested or skipped, in the order it happened.
///
/// A `(uri, method)` pair appears at most once; recording it again updates the
/// existing row in place. Once `capacity` rows are held, new pairs are counted
/// as dropped instead of stored.
#[derive(Debug, Clone)]
pub struct ResultLedger {
    records: Vec<ScanResultRecord>,
    capacity: usize,
    dropped: u64,
}

/// What [`ResultLedger::record`] did with a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    Added,
    Updated,
    Dropped,
}

impl ResultLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Vec::new(),
            capacity,
            dropped: 0,
        }
    }

    pub fn record(&mut self, record: ScanResultRecord) -> Recorded {
        if let Some(existing) = self.records.iter_mut().find(|r| **r == record)
        {
            *existing = record;
            return Recorded::Updated;
        }
        if self.records.len() >= self.capacity {
            self.dropped += 1;
            return Recorded::Dropped;
        }
        self.records.push(record);
        Recorded::Added
    }

    pub fn remove(&mut self, uri: &str, method: &str) -> Option<ScanResultRecord> {
        let idx = self.records.iter().position(|r| r.same_entry(uri, method))?;
        Some(self.records.remove(idx))
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.dropped = 0;
    }

    pub fn records(&self) -> &[ScanResultRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
