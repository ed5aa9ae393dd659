//! Wall clock helpers for the wake/sleep episodes.
//!
//! All timestamps are UTC epoch seconds. Local time is only derived for
//! display.

use crate::settings::Settings;

/// Earliest plausible clock reading (2026-01-01T00:00:00Z).
///
/// An RTC that lost power reports something far older; samples taken before
/// the clock is set would poison the timestamp index.
pub const MIN_SANE_EPOCH: i64 = 1_767_225_600;

/// Whether `now` looks like a set clock rather than a reset RTC.
pub const fn time_is_sane(now: i64) -> bool {
    now >= MIN_SANE_EPOCH
}

/// Fixed-offset time zone with an optional daylight saving shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeZone {
    /// Standard offset from UTC in seconds
    pub base_offset_secs: i64,
    /// Extra offset while summer time is on
    pub dst_offset_secs: i64,
}

impl Default for TimeZone {
    /// Central European Time
    fn default() -> Self {
        Self {
            base_offset_secs: 3_600,
            dst_offset_secs: 3_600,
        }
    }
}

impl TimeZone {
    /// Current offset from UTC given the user's summer time setting.
    pub const fn offset_secs(&self, summer_time: bool) -> i64 {
        if summer_time {
            self.base_offset_secs + self.dst_offset_secs
        } else {
            self.base_offset_secs
        }
    }

    /// Convert `utc` epoch seconds to local epoch seconds.
    pub fn local_time(&self, utc: i64, settings: &Settings) -> i64 {
        utc.saturating_add(self.offset_secs(settings.summer_time))
    }
}

/// When to resync the clock over the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSyncPolicy {
    pub staleness_secs: i64,
}

impl Default for TimeSyncPolicy {
    fn default() -> Self {
        Self {
            staleness_secs: 86_400,
        }
    }
}

impl TimeSyncPolicy {
    /// A sync is due if the clock was never synced or the last sync is older
    /// than the staleness interval.
    pub fn is_due(&self, last_sync: i64, now: i64) -> bool {
        last_sync == 0 || now.saturating_sub(last_sync) > self.staleness_secs
    }
}
