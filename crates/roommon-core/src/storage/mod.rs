//! # Sensor History Store
//!
//! Durable, append-only storage for periodic sensor samples, designed for a
//! device that spends most of its life in deep sleep:
//!
//! - **Append-only log** of fixed-width records on block storage. Record `i`
//!   lives at byte `i * RECORD_SIZE`, so any record is one seek away.
//! - **Hot cache** of the most recent records in RAM, updated in the same step
//!   as every durable write so "current value" reads never touch storage.
//! - **Timestamp index** (oldest/newest) that rejects out-of-range queries
//!   without any storage reads and drives index estimation for range scans.
//!
//! All three are owned by a single [`StorageManager`] handle. Nothing lives in
//! globals; after a deep sleep the handle is rebuilt either from storage (cold
//! start) or from a [`RetainedIndex`] kept in retention memory (warm resume).
//!
//! ## Power loss
//!
//! A write interrupted by power loss can leave a partial record at the end of
//! the file. Mounting ignores it (`count = floor(len / RECORD_SIZE)`) and the
//! next append writes over it at `count * RECORD_SIZE`.

pub mod append_log;
pub mod cache;
pub mod index;
pub mod manager;
pub mod mem;
pub mod record;
pub mod sd_card;

pub use append_log::AppendLog;
pub use cache::{HOT_CACHE_CAPACITY, HotCache};
pub use index::{RetainedIndex, TimestampIndex};
pub use manager::{RecordStore, StorageManager};
pub use mem::MemStorage;
pub use record::{CorruptRecord, RECORD_SIZE, SensorRecord};
pub use sd_card::SdCardStorage;

use core::fmt::Debug;

use thiserror_no_std::Error;

/// Default name of the history log file (8.3 so it also fits FAT volumes).
pub const HISTORY_FILE: &str = "history.dat";

/// Block storage capability consumed by the store.
///
/// Files are addressed by name. Every call runs to completion; there is no
/// partial-success reporting beyond the error value.
pub trait BlockStorage {
    type Error: Debug;

    /// Length of the named file in bytes, or `None` if it does not exist.
    fn len(&mut self, name: &str) -> Result<Option<u64>, Self::Error>;

    /// Read into `buf` starting at `offset`, returning the number of bytes
    /// read. Fewer than `buf.len()` bytes means end of file was reached.
    fn read_at(&mut self, name: &str, offset: u64, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Write `data` at `offset`, creating the file if needed. `offset` is never
    /// past the current end of file. Data is durable once this returns `Ok`.
    fn write_at(&mut self, name: &str, offset: u64, data: &[u8]) -> Result<(), Self::Error>;

    /// Delete the named file. Deleting a missing file succeeds.
    fn remove(&mut self, name: &str) -> Result<(), Self::Error>;
}

/// Errors surfaced by the store.
///
/// `E` is the error type of the underlying [`BlockStorage`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError<E> {
    /// Storage unavailable or a read/write failed. Store state is unchanged.
    #[error("storage I/O failed: {0:?}")]
    Io(E),
    /// Index at or beyond the number of stored records.
    #[error("record {index} out of range (count {count})")]
    OutOfRange { index: usize, count: usize },
    /// A record inside the log could not be read in full.
    #[error("record {index} is truncated")]
    CorruptRecord { index: usize },
}
