use heapless::Deque;
use log::debug;

use super::append_log::AppendLog;
use super::record::SensorRecord;
use super::{BlockStorage, StoreError};

/// Default number of records mirrored in RAM (24 hours at 30 minute intervals).
pub const HOT_CACHE_CAPACITY: usize = 48;

/// Bounded RAM mirror of the log's tail.
///
/// Always holds exactly the last `min(K, count)` log records in ascending
/// order. It never decides anything on its own: it is rebuilt from the log at
/// open and pushed to after every successful append.
pub struct HotCache<const K: usize> {
    records: Deque<SensorRecord, K>,
}

impl<const K: usize> Default for HotCache<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const K: usize> HotCache<K> {
    pub fn new() -> Self {
        Self {
            records: Deque::new(),
        }
    }

    /// Reload the last `min(K, count)` records from `log`.
    ///
    /// On error the cache is left empty.
    pub fn rebuild<S: BlockStorage>(
        &mut self,
        log: &mut AppendLog<S>,
    ) -> Result<(), StoreError<S::Error>> {
        self.records.clear();

        let count = log.len();
        let start = count - count.min(K);
        for index in start..count {
            match log.read_at(index) {
                Ok(record) => self.on_append(record),
                Err(e) => {
                    self.records.clear();
                    return Err(e);
                }
            }
        }

        debug!(" Hot cache rebuilt with {} records", self.records.len());
        Ok(())
    }

    /// Mirror a record that was just durably appended.
    pub fn on_append(&mut self, record: SensorRecord) {
        // If buffer is full, remove oldest
        if self.records.is_full() {
            self.records.pop_front();
        }
        let _ = self.records.push_back(record);
    }

    /// Most recent record, without storage I/O.
    pub fn latest(&self) -> Option<SensorRecord> {
        self.records.back().copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        K
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Absolute log index of the first cached record, given the log `count`.
    pub fn first_index(&self, count: usize) -> usize {
        count - self.records.len()
    }

    /// Cached record at absolute log `index`, if it is inside the cache window.
    pub fn get(&self, index: usize, count: usize) -> Option<SensorRecord> {
        let first = self.first_index(count);
        if index < first || index >= count {
            return None;
        }
        self.records.iter().nth(index - first).copied()
    }

    /// Cached records in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &SensorRecord> {
        self.records.iter()
    }
}
