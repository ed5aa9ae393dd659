use crate::query::DEFAULT_MAX_POINTS;
use crate::storage::HISTORY_FILE;

/// Records of slack added on each side of an estimated scan range.
pub const DEFAULT_ESTIMATE_MARGIN: usize = 10;

/// Tunables of a [`StorageManager`](crate::storage::StorageManager).
///
/// The hot cache capacity is a const generic on the manager itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Log file name on the storage volume
    pub history_file: &'static str,
    /// Default output cap for queries
    pub max_points: usize,
    /// Padding around estimated scan bounds, in records. Widen this if the
    /// sampling cadence gets irregular (missed wake-ups, clock jumps).
    pub estimate_margin: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            history_file: HISTORY_FILE,
            max_points: DEFAULT_MAX_POINTS,
            estimate_margin: DEFAULT_ESTIMATE_MARGIN,
        }
    }
}
