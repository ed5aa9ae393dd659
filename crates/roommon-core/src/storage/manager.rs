use alloc::vec::Vec;

use log::{debug, info, warn};

use super::append_log::AppendLog;
use super::cache::{HOT_CACHE_CAPACITY, HotCache};
use super::index::{RetainedIndex, TimestampIndex};
use super::record::{RECORD_SIZE, SensorRecord};
use super::{BlockStorage, StoreError};
use crate::config::StoreConfig;
use crate::query::{QueryWindow, Series, SeriesRequest, TimeWindow, decimate};
use crate::sensors::SensorType;

/// Store handle with the default hot cache capacity.
pub type RecordStore<S> = StorageManager<S, HOT_CACHE_CAPACITY>;

/// Owns the history log, its hot cache and timestamp index
///
/// This is the only way in or out of the sensor history:
/// 1. Appends go to the log first, then to the cache and index, in one call
/// 2. Reads of recent records are served from RAM
/// 3. Range queries reject, estimate, scan, filter and decimate without
///    touching records outside the estimated window
///
/// There is exactly one writer and no concurrent access, so nothing here
/// locks. Every method runs to completion.
pub struct StorageManager<S: BlockStorage, const K: usize> {
    log: AppendLog<S>,
    cache: HotCache<K>,
    index: TimestampIndex,
    config: StoreConfig,
}

impl<S: BlockStorage, const K: usize> StorageManager<S, K> {
    /// Cold start: mount the log and recompute everything from storage.
    ///
    /// If the storage cannot be mounted the store starts empty and stays fully
    /// usable; the failure is only logged.
    pub fn open(storage: S, config: StoreConfig) -> Self {
        let mut manager = Self {
            log: AppendLog::new(storage, config.history_file),
            cache: HotCache::new(),
            index: TimestampIndex::default(),
            config,
        };
        manager.reload();
        manager
    }

    /// Warm resume: adopt `retained` index scalars instead of re-reading them.
    ///
    /// The retained count is checked against the stored length first; if they
    /// disagree (the log was changed behind our back) this falls back to a full
    /// [`reload`](Self::reload). The hot cache is always rebuilt since it does
    /// not survive sleep.
    pub fn resume(storage: S, config: StoreConfig, retained: RetainedIndex) -> Self {
        let mut manager = Self {
            log: AppendLog::new(storage, config.history_file),
            cache: HotCache::new(),
            index: TimestampIndex::default(),
            config,
        };

        let count = retained.count as usize;
        match manager.log.stored_len() {
            Ok(len) if len.unwrap_or(0) / RECORD_SIZE as u64 == count as u64 => {
                manager.log.restore_count(count);
                manager.index = TimestampIndex::from_retained(&retained);
                if let Err(e) = manager.cache.rebuild(&mut manager.log) {
                    warn!(" Hot cache rebuild failed on resume: {:?}", e);
                    manager.degrade();
                } else {
                    info!(" Resumed with {} records (RAM: {})", count, manager.cache.len());
                }
            }
            Ok(len) => {
                warn!(
                    " Retained count {} disagrees with stored length {:?}, reloading",
                    count, len
                );
                manager.reload();
            }
            Err(e) => {
                warn!(" Storage unavailable on resume: {:?}", e);
                manager.degrade();
            }
        }

        manager
    }

    /// Recompute count, index and cache from storage.
    pub fn reload(&mut self) {
        if let Err(e) = self.mount() {
            warn!(" Mount failed, continuing with an empty store: {:?}", e);
            self.degrade();
        }
    }

    fn mount(&mut self) -> Result<(), StoreError<S::Error>> {
        self.log.mount().map_err(StoreError::Io)?;
        self.index = TimestampIndex::recompute(&mut self.log)?;
        self.cache.rebuild(&mut self.log)?;

        info!(
            " Loaded {} entries (total: {})",
            self.cache.len(),
            self.log.len()
        );
        Ok(())
    }

    fn degrade(&mut self) {
        self.log.unmount();
        self.index.reset();
        self.cache.clear();
    }

    /// Index scalars to keep in retention memory over deep sleep.
    pub fn retained(&self) -> RetainedIndex {
        RetainedIndex {
            count: self.log.len() as u32,
            oldest: self.index.oldest(),
            newest: self.index.newest(),
        }
    }

    /// Durably append `record`.
    ///
    /// Either the record becomes readable at index `len() - 1` and the cache
    /// and index reflect it, or an error is returned and nothing changed.
    ///
    /// A store that started degraded mounts again first, so records already on
    /// the medium are kept and the new one goes after them.
    pub fn append(&mut self, record: SensorRecord) -> Result<(), StoreError<S::Error>> {
        if !self.log.is_mounted() {
            info!(" Store not mounted, retrying before append");
            if let Err(e) = self.mount() {
                self.degrade();
                return Err(e);
            }
        }

        self.log.append(&record)?;

        let count = self.log.len();
        self.index.on_append(record.timestamp, count);
        self.cache.on_append(record);
        debug!(" Entries: {} (RAM: {})", count, self.cache.len());
        Ok(())
    }

    /// Most recent record, from RAM.
    pub fn latest(&self) -> Option<SensorRecord> {
        self.cache.latest()
    }

    /// Record at absolute `index`, from the cache when possible.
    pub fn read_at(&mut self, index: usize) -> Result<SensorRecord, StoreError<S::Error>> {
        let count = self.log.len();
        if index >= count {
            return Err(StoreError::OutOfRange { index, count });
        }

        match self.cache.get(index, count) {
            Some(record) => Ok(record),
            None => self.log.read_at(index),
        }
    }

    /// Delete the whole history.
    pub fn clear(&mut self) -> Result<(), StoreError<S::Error>> {
        self.log.clear()?;
        self.index.reset();
        self.cache.clear();
        Ok(())
    }

    /// A request for `window` of `sensor` using this store's output cap.
    pub fn request(&self, window: TimeWindow, sensor: SensorType) -> SeriesRequest {
        SeriesRequest::new(window, sensor).with_max_points(self.config.max_points)
    }

    /// Values of `request.sensor` over the requested window, oldest first.
    ///
    /// Cost is bounded by the estimated window width, not by the size of the
    /// history. Windows entirely outside `[oldest, newest]` are answered
    /// without touching storage.
    pub fn query(
        &mut self,
        now: i64,
        request: &SeriesRequest,
    ) -> Result<Series, StoreError<S::Error>> {
        let window = QueryWindow::resolve(now, request.window, request.offset);
        let count = self.log.len();

        // Early exit if no data in range
        if self.index.rejects(window.start, window.end, count) {
            debug!(
                " Query {}..{} outside stored range, skipping scan",
                window.start, window.end
            );
            return Ok(Series::InsufficientData);
        }

        let bounds =
            self.index
                .scan_bounds(window.start, window.end, count, self.config.estimate_margin);
        let cache_start = self.cache.first_index(count);

        let mut matches = Vec::new();

        // Older part of the scan comes from storage
        for i in bounds.start..bounds.end.min(cache_start) {
            let record = self.log.read_at(i)?;
            if window.contains(record.timestamp) {
                matches.push(request.sensor.value_of(&record));
            }
        }

        // The rest is already in RAM
        let from_cache = bounds.start.max(cache_start);
        if from_cache < bounds.end {
            matches.extend(
                self.cache
                    .iter()
                    .skip(from_cache - cache_start)
                    .take(bounds.end - from_cache)
                    .filter(|record| window.contains(record.timestamp))
                    .map(|record| request.sensor.value_of(record)),
            );
        }

        debug!(
            " Query {}..{} scanned {:?}, {} matches",
            window.start,
            window.end,
            bounds,
            matches.len()
        );

        Ok(Series::from_points(decimate(matches, request.max_points)))
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Timestamp of record 0 (0 when empty).
    pub fn oldest(&self) -> i64 {
        self.index.oldest()
    }

    /// Timestamp of the last record (0 when empty).
    pub fn newest(&self) -> i64 {
        self.index.newest()
    }

    pub fn hot_cache(&self) -> &HotCache<K> {
        &self.cache
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Read-only access to the underlying storage.
    pub fn storage(&self) -> &S {
        self.log.storage()
    }

    /// Close the store and give back the storage handle.
    pub fn into_storage(self) -> S {
        self.log.into_storage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStorage;
    use crate::storage::mem::MemError;

    const T0: i64 = 1_767_225_600;

    fn record(temperature: f32, timestamp: i64) -> SensorRecord {
        SensorRecord::new(temperature, 40.0 + temperature / 10.0, 1013.0, timestamp)
    }

    fn open_empty() -> RecordStore<MemStorage> {
        RecordStore::open(MemStorage::new(), StoreConfig::default())
    }

    fn daily_temperature() -> SeriesRequest {
        SeriesRequest::new(TimeWindow::Daily, SensorType::Temperature)
    }

    /// Cache contents must equal the last min(K, count) log records.
    fn assert_cache_mirrors_log<const K: usize>(store: &mut StorageManager<MemStorage, K>) {
        let count = store.len();
        let expected = count.min(K);
        assert_eq!(store.hot_cache().len(), expected);

        let cached: Vec<SensorRecord> = store.hot_cache().iter().copied().collect();
        for (offset, record) in cached.into_iter().enumerate() {
            let index = count - expected + offset;
            assert_eq!(store.log.read_at(index).unwrap(), record);
        }
    }

    #[test]
    fn test_append_then_read_back() {
        let mut store = open_empty();
        let records: Vec<SensorRecord> = (0..100)
            .map(|i| record(20.0 + i as f32 / 10.0, T0 + i * 1800))
            .collect();

        for r in &records {
            store.append(*r).unwrap();
        }

        assert_eq!(store.len(), records.len());
        for (i, r) in records.iter().enumerate() {
            assert_eq!(store.read_at(i).unwrap(), *r);
        }
        assert_eq!(store.oldest(), T0);
        assert_eq!(store.newest(), T0 + 99 * 1800);
    }

    #[test]
    fn test_cache_mirrors_log_after_every_append() {
        let mut store =
            StorageManager::<MemStorage, 5>::open(MemStorage::new(), StoreConfig::default());

        for i in 0..12 {
            store.append(record(i as f32, T0 + i)).unwrap();
            assert_cache_mirrors_log(&mut store);
        }
    }

    #[test]
    fn test_cache_keeps_last_48_of_50() {
        let mut store = open_empty();
        for i in 0..50 {
            store.append(record(i as f32, T0 + i * 1800)).unwrap();
        }

        assert_eq!(store.hot_cache().len(), 48);
        let first = *store.hot_cache().iter().next().unwrap();
        assert_eq!(first, store.log.read_at(2).unwrap());
        assert_eq!(store.latest(), Some(record(49.0, T0 + 49 * 1800)));
    }

    #[test]
    fn test_latest_needs_no_storage() {
        let mut store = open_empty();
        store.append(record(21.0, T0)).unwrap();

        store.log.storage_mut().set_unavailable(true);
        assert_eq!(store.latest(), Some(record(21.0, T0)));
    }

    #[test]
    fn test_read_at_out_of_range() {
        let mut store = open_empty();
        store.append(record(21.0, T0)).unwrap();

        assert_eq!(
            store.read_at(1),
            Err(StoreError::OutOfRange { index: 1, count: 1 })
        );
    }

    #[test]
    fn test_read_at_uses_log_outside_cache() {
        let mut store =
            StorageManager::<MemStorage, 2>::open(MemStorage::new(), StoreConfig::default());
        for i in 0..5 {
            store.append(record(i as f32, T0 + i)).unwrap();
        }

        store.log.storage_mut().reset_reads();
        assert_eq!(store.read_at(4).unwrap(), record(4.0, T0 + 4));
        assert_eq!(store.storage().reads(), 0);
        assert_eq!(store.read_at(0).unwrap(), record(0.0, T0));
        assert_eq!(store.storage().reads(), 1);
    }

    #[test]
    fn test_clear_then_append() {
        let mut store = open_empty();
        for i in 0..3 {
            store.append(record(i as f32, T0 + i)).unwrap();
        }

        store.clear().unwrap();
        assert_eq!(store.len(), 0);
        assert!(matches!(store.read_at(0), Err(StoreError::OutOfRange { .. })));
        assert_eq!(store.latest(), None);
        assert_eq!(store.retained(), RetainedIndex::default());

        store.append(record(30.0, T0 + 100)).unwrap();
        assert_eq!(store.read_at(0).unwrap(), record(30.0, T0 + 100));
        assert_eq!(store.oldest(), T0 + 100);
    }

    #[test]
    fn test_failed_append_changes_nothing() {
        let mut store = open_empty();
        store.append(record(20.0, T0)).unwrap();
        let before = store.retained();

        store.log.storage_mut().fail_writes(true);
        assert_eq!(
            store.append(record(25.0, T0 + 60)),
            Err(StoreError::Io(MemError::WriteFailed))
        );

        assert_eq!(store.retained(), before);
        assert_eq!(store.latest(), Some(record(20.0, T0)));
        assert_eq!(store.hot_cache().len(), 1);
    }

    #[test]
    fn test_reopen_drops_partial_tail() {
        let mut store = open_empty();
        for i in 0..4 {
            store.append(record(i as f32, T0 + i)).unwrap();
        }

        let mut storage = store.into_storage();
        let mut bytes = storage.file("history.dat").unwrap().to_vec();
        bytes.extend_from_slice(&[1, 2, 3]);
        let file_size = bytes.len();
        storage.insert_file("history.dat", bytes);

        let store = RecordStore::open(storage, StoreConfig::default());
        assert_eq!(store.len(), file_size / RECORD_SIZE);
        assert_eq!(store.len(), 4);
        assert_eq!(store.newest(), T0 + 3);
    }

    #[test]
    fn test_open_on_unavailable_storage_degrades_to_empty() {
        let mut storage = MemStorage::new();
        storage.insert_file("history.dat", record(1.0, T0).to_bytes().to_vec());
        storage.set_unavailable(true);

        let mut store = RecordStore::open(storage, StoreConfig::default());
        assert_eq!(store.len(), 0);
        assert!(store.query(T0, &daily_temperature()).unwrap().is_insufficient());

        store.log.storage_mut().set_unavailable(false);
        store.append(record(2.0, T0 + 1)).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.read_at(0).unwrap(), record(1.0, T0));
        assert_eq!(store.oldest(), T0);
    }

    fn history_of(count: i64) -> MemStorage {
        let mut store = open_empty();
        for i in 0..count {
            store.append(record(i as f32, T0 + i)).unwrap();
        }
        store.into_storage()
    }

    #[test]
    fn test_append_after_degraded_open_keeps_history() {
        let mut storage = history_of(3);
        storage.set_unavailable(true);

        let mut store = RecordStore::open(storage, StoreConfig::default());
        assert!(store.is_empty());

        store.log.storage_mut().set_unavailable(false);
        store.append(record(99.0, T0 + 5000)).unwrap();

        let mut store = RecordStore::open(store.into_storage(), StoreConfig::default());
        assert_eq!(store.len(), 4);
        for i in 0..3 {
            assert_eq!(store.read_at(i).unwrap(), record(i as f32, T0 + i as i64));
        }
        assert_eq!(store.read_at(3).unwrap(), record(99.0, T0 + 5000));
        assert_eq!(store.oldest(), T0);
        assert_eq!(store.newest(), T0 + 5000);
    }

    #[test]
    fn test_append_while_still_unavailable_writes_nothing() {
        let mut storage = history_of(2);
        storage.set_unavailable(true);

        let mut store = RecordStore::open(storage, StoreConfig::default());
        assert_eq!(
            store.append(record(5.0, T0 + 10)),
            Err(StoreError::Io(MemError::Unavailable))
        );
        assert!(store.is_empty());
        assert_eq!(store.latest(), None);

        let storage = store.into_storage();
        assert_eq!(storage.file_len("history.dat"), Some(2 * RECORD_SIZE as u64));
    }

    #[test]
    fn test_resume_on_unavailable_storage_degrades() {
        let mut store = RecordStore::open(history_of(5), StoreConfig::default());
        let retained = store.retained();
        let mut storage = store.into_storage();
        storage.set_unavailable(true);

        let mut store = RecordStore::resume(storage, StoreConfig::default(), retained);
        assert!(store.is_empty());
        assert_eq!(store.retained(), RetainedIndex::default());

        store.log.storage_mut().set_unavailable(false);
        store.append(record(7.0, T0 + 100)).unwrap();
        assert_eq!(store.len(), 6);
        assert_eq!(store.oldest(), T0);
        assert_eq!(store.read_at(0).unwrap(), record(0.0, T0));
    }

    #[test]
    fn test_resume_with_failing_cache_rebuild_degrades() {
        let mut store = RecordStore::open(history_of(5), StoreConfig::default());
        let retained = store.retained();
        let mut storage = store.into_storage();
        storage.fail_reads(true);

        let mut store = RecordStore::resume(storage, StoreConfig::default(), retained);
        assert!(store.is_empty());
        assert_eq!(store.hot_cache().len(), 0);
        assert_eq!(store.newest(), 0);

        store.log.storage_mut().fail_reads(false);
        store.append(record(7.0, T0 + 100)).unwrap();
        assert_eq!(store.len(), 6);
        assert_eq!(store.hot_cache().len(), 6);
        assert_eq!(store.read_at(4).unwrap(), record(4.0, T0 + 4));
        assert_eq!(store.latest(), Some(record(7.0, T0 + 100)));
    }

    #[test]
    fn test_resume_trusts_retained_index() {
        let mut store = open_empty();
        for i in 0..60 {
            store.append(record(i as f32, T0 + i * 1800)).unwrap();
        }
        let retained = store.retained();

        let mut storage = store.into_storage();
        storage.reset_reads();
        let store = RecordStore::resume(storage, StoreConfig::default(), retained);

        assert_eq!(store.retained(), retained);
        // Only the cache rebuild touched storage, never record 0
        assert_eq!(store.storage().reads(), 48);
        assert_eq!(
            store.storage().lowest_read_offset(),
            Some(SensorRecord::offset_of(12))
        );
        assert_eq!(store.latest(), Some(record(59.0, T0 + 59 * 1800)));
    }

    #[test]
    fn test_resume_with_stale_retained_state_reloads() {
        let mut store = open_empty();
        for i in 0..5 {
            store.append(record(i as f32, T0 + i)).unwrap();
        }
        let stale = RetainedIndex {
            count: 3,
            oldest: 0,
            newest: 0,
        };

        let store = RecordStore::resume(store.into_storage(), StoreConfig::default(), stale);
        assert_eq!(store.len(), 5);
        assert_eq!(store.oldest(), T0);
        assert_eq!(store.newest(), T0 + 4);
    }

    #[test]
    fn test_recent_points_in_order() {
        let mut store = open_empty();
        let t = T0;
        store.append(record(21.2, t)).unwrap();
        store.append(record(21.5, t + 1800)).unwrap();
        store.append(record(21.8, t + 3600)).unwrap();

        let series = store.query(t + 3600, &daily_temperature()).unwrap();
        assert_eq!(series, Series::Points(alloc::vec![21.2, 21.5, 21.8]));
    }

    #[test]
    fn test_empty_store_queries_read_nothing() {
        let mut store = open_empty();
        store.log.storage_mut().reset_reads();

        for window in TimeWindow::ALL {
            for offset in [0, 1, 5] {
                let request = SeriesRequest::new(window, SensorType::Humidity).with_offset(offset);
                assert_eq!(store.query(T0, &request).unwrap(), Series::InsufficientData);
            }
        }
        assert_eq!(store.storage().reads(), 0);
    }

    #[test]
    fn test_out_of_range_window_reads_nothing() {
        let mut store = open_empty();
        for i in 0..100 {
            store.append(record(i as f32, T0 + i * 1800)).unwrap();
        }
        store.log.storage_mut().reset_reads();

        // Far in the past, before the first record
        let old = daily_temperature().with_offset(50);
        assert!(store.query(T0 + 99 * 1800, &old).unwrap().is_insufficient());

        // Window ends before the first record is taken
        assert!(store.query(T0 - 10, &daily_temperature()).unwrap().is_insufficient());

        assert_eq!(store.storage().reads(), 0);
    }

    #[test]
    fn test_scan_skips_records_before_window() {
        let mut store = open_empty();
        let interval = 1728;
        for i in 0..200 {
            store.append(record(i as f32, T0 + i * interval)).unwrap();
        }
        store.log.storage_mut().reset_reads();

        // Window start lands just after record 149
        let now = T0 + 199 * interval + 1;
        let series = store.query(now, &daily_temperature()).unwrap();

        let expected: Vec<f32> = (150..200).map(|i| i as f32).collect();
        assert_eq!(series.points(), expected.as_slice());

        let margin = store.config().estimate_margin;
        let lowest = store.storage().lowest_read_offset().unwrap();
        assert!(lowest >= SensorRecord::offset_of(150 - margin - 1));
        assert!(store.storage().reads() <= 2 * margin + 2);
    }

    #[test]
    fn test_query_decimates_to_cap() {
        let mut store = open_empty();
        // 300 records, 5 minutes apart, all inside the last 24 hours
        for i in 0..300 {
            store.append(record(i as f32, T0 + i * 288)).unwrap();
        }

        let request = daily_temperature().with_max_points(120);
        let series = store.query(T0 + 299 * 288, &request).unwrap();
        let points = series.points();

        assert_eq!(points.len(), 120);
        assert_eq!(points[0], 0.0);
        assert_eq!(points[1], 2.0);
        assert!(points.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_query_previous_span() {
        let mut store = open_empty();
        // One record per hour for three days
        for i in 0..72 {
            store.append(record(i as f32, T0 + i * 3600)).unwrap();
        }

        let now = T0 + 72 * 3600;
        let yesterday = daily_temperature().with_offset(1);
        let series = store.query(now, &yesterday).unwrap();

        let expected: Vec<f32> = (24..48).map(|i| i as f32).collect();
        assert_eq!(series.points(), expected.as_slice());
    }

    #[test]
    fn test_query_humidity_channel() {
        let mut store = open_empty();
        store.append(record(20.0, T0)).unwrap();
        store.append(record(30.0, T0 + 60)).unwrap();

        let request = SeriesRequest::new(TimeWindow::Daily, SensorType::Humidity);
        let series = store.query(T0 + 60, &request).unwrap();
        assert_eq!(series.points(), &[42.0, 43.0]);
    }

    #[test]
    fn test_single_match_is_insufficient() {
        let mut store = open_empty();
        store.append(record(20.0, T0)).unwrap();

        assert_eq!(
            store.query(T0, &daily_temperature()).unwrap(),
            Series::InsufficientData
        );
    }

    #[test]
    fn test_irregular_sampling_stays_exact() {
        let mut store = open_empty();
        // A dense burst followed by a long gap: interpolation is off, the
        // margin and the exact filter keep the result correct
        for i in 0..30 {
            store.append(record(i as f32, T0 + i * 60)).unwrap();
        }
        for i in 30..40 {
            store.append(record(i as f32, T0 + 10 * 86_400 + i * 60)).unwrap();
        }

        let now = T0 + 10 * 86_400 + 40 * 60;
        let series = store.query(now, &daily_temperature()).unwrap();
        let expected: Vec<f32> = (30..40).map(|i| i as f32).collect();
        assert_eq!(series.points(), expected.as_slice());
    }
}
