use core::ops::Range;

use log::debug;
use serde::{Deserialize, Serialize};

use super::append_log::AppendLog;
use super::{BlockStorage, StoreError};

/// Index scalars as kept in retention memory across deep sleep.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetainedIndex {
    pub count: u32,
    pub oldest: i64,
    pub newest: i64,
}

/// Timestamps of the first and last log record.
///
/// Only ever used to reject queries and to bound scans; the log stays the
/// authority on what is actually stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimestampIndex {
    oldest: i64,
    newest: i64,
}

impl TimestampIndex {
    pub const fn new(oldest: i64, newest: i64) -> Self {
        Self { oldest, newest }
    }

    /// Cold start: read the first and last record of `log`.
    pub fn recompute<S: BlockStorage>(
        log: &mut AppendLog<S>,
    ) -> Result<Self, StoreError<S::Error>> {
        let count = log.len();
        if count == 0 {
            return Ok(Self::default());
        }

        let oldest = log.read_at(0)?.timestamp;
        let newest = log.read_at(count - 1)?.timestamp;
        debug!(" Timestamp index recomputed: {}..={}", oldest, newest);
        Ok(Self { oldest, newest })
    }

    /// Warm resume: trust what retention memory says.
    pub const fn from_retained(retained: &RetainedIndex) -> Self {
        Self {
            oldest: retained.oldest,
            newest: retained.newest,
        }
    }

    pub const fn oldest(&self) -> i64 {
        self.oldest
    }

    pub const fn newest(&self) -> i64 {
        self.newest
    }

    /// Track a record appended as number `new_count` (1-based).
    pub fn on_append(&mut self, timestamp: i64, new_count: usize) {
        self.newest = timestamp;
        if new_count == 1 {
            self.oldest = timestamp;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// True when no record in a log of `count` records can fall in
    /// `[start, end]`.
    pub fn rejects(&self, start: i64, end: i64, count: usize) -> bool {
        count == 0 || end < self.oldest || start > self.newest
    }

    /// Estimated index of timestamp `t`, assuming even sampling between
    /// `oldest` and `newest`. Clamped to `[0, count]`.
    pub fn estimate(&self, t: i64, count: usize) -> usize {
        if t <= self.oldest {
            return 0;
        }
        if t >= self.newest {
            return count;
        }

        // round((t - oldest) / (newest - oldest) * count), in integers
        let span = self.newest as i128 - self.oldest as i128;
        let elapsed = t as i128 - self.oldest as i128;
        let scaled = elapsed * count as i128;
        ((scaled + span / 2) / span) as usize
    }

    /// Range of log indices to scan for records in `[start, end]`.
    ///
    /// Both estimates are widened by `margin` records to absorb sampling drift
    /// (missed wake-ups, clock corrections). Without a usable time span (a
    /// single timestamp, or `newest` before `oldest`) the whole log is scanned.
    pub fn scan_bounds(&self, start: i64, end: i64, count: usize, margin: usize) -> Range<usize> {
        if self.newest <= self.oldest {
            return 0..count;
        }

        let first = self.estimate(start, count).saturating_sub(margin);
        let last = self
            .estimate(end, count)
            .saturating_add(margin)
            .min(count);
        first.min(last)..last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemStorage, SensorRecord};

    #[test]
    fn test_estimate_uniform() {
        let index = TimestampIndex::new(1000, 2000);

        assert_eq!(index.estimate(1000, 100), 0);
        assert_eq!(index.estimate(1500, 100), 50);
        assert_eq!(index.estimate(1504, 100), 50);
        assert_eq!(index.estimate(1505, 100), 51);
        assert_eq!(index.estimate(2000, 100), 100);
        assert_eq!(index.estimate(-5, 100), 0);
        assert_eq!(index.estimate(i64::MAX, 100), 100);
    }

    #[test]
    fn test_scan_bounds_are_padded_and_clipped() {
        let index = TimestampIndex::new(0, 1000);

        assert_eq!(index.scan_bounds(500, 600, 100, 10), 40..70);
        assert_eq!(index.scan_bounds(0, 50, 100, 10), 0..15);
        assert_eq!(index.scan_bounds(950, 1000, 100, 10), 85..100);
    }

    #[test]
    fn test_degenerate_span_scans_everything() {
        let single = TimestampIndex::new(500, 500);
        assert_eq!(single.scan_bounds(0, 1000, 3, 10), 0..3);

        let backwards = TimestampIndex::new(900, 100);
        assert_eq!(backwards.scan_bounds(0, 1000, 7, 10), 0..7);
    }

    #[test]
    fn test_rejects() {
        let index = TimestampIndex::new(1000, 2000);

        assert!(index.rejects(0, 999, 10));
        assert!(index.rejects(2001, 3000, 10));
        assert!(index.rejects(1000, 2000, 0));
        assert!(!index.rejects(0, 1000, 10));
        assert!(!index.rejects(2000, 3000, 10));
    }

    #[test]
    fn test_on_append_sets_oldest_once() {
        let mut index = TimestampIndex::default();
        index.on_append(100, 1);
        index.on_append(200, 2);

        assert_eq!(index.oldest(), 100);
        assert_eq!(index.newest(), 200);
    }

    #[test]
    fn test_recompute_reads_first_and_last() {
        let mut log = AppendLog::new(MemStorage::new(), "history.dat");
        log.mount().unwrap();
        for ts in [10, 20, 30, 40] {
            log.append(&SensorRecord::new(0.0, 0.0, 0.0, ts)).unwrap();
        }

        let index = TimestampIndex::recompute(&mut log).unwrap();
        assert_eq!(index, TimestampIndex::new(10, 40));
    }
}
