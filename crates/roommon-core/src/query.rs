//! Range query types: named spans, resolved windows and decimation.
//!
//! The scan itself lives in [`StorageManager::query`] because it needs the
//! log, the hot cache and the timestamp index together; everything here is
//! pure and stateless.
//!
//! [`StorageManager::query`]: crate::storage::StorageManager::query

use alloc::vec::Vec;

use crate::sensors::SensorType;

/// Default output cap: one point per horizontal pixel of the graph area.
pub const DEFAULT_MAX_POINTS: usize = 120;

/// Furthest a graph can be scrolled back, in whole spans.
pub const MAX_OFFSET: u32 = 100;

/// Named span of history a graph covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    /// 24 hours
    Daily,
    /// 7 days
    Weekly,
    /// 30 days
    Monthly,
    /// 365 days
    Yearly,
}

impl TimeWindow {
    pub const ALL: [Self; 4] = [Self::Daily, Self::Weekly, Self::Monthly, Self::Yearly];

    /// Get a short label for display
    pub const fn label(self) -> &'static str {
        match self {
            Self::Daily => "24h",
            Self::Weekly => "7d",
            Self::Monthly => "30d",
            Self::Yearly => "365d",
        }
    }

    /// Suffix for the "N spans ago" marker, e.g. `-3d`
    pub const fn offset_suffix(self) -> &'static str {
        match self {
            Self::Daily => "d",
            Self::Weekly => "w",
            Self::Monthly => "m",
            Self::Yearly => "y",
        }
    }

    /// Get the duration of this window in seconds
    pub const fn duration_secs(self) -> i64 {
        match self {
            Self::Daily => 86_400,
            Self::Weekly => 604_800,
            Self::Monthly => 2_592_000,
            Self::Yearly => 31_536_000,
        }
    }

    /// The next longer span, wrapping from yearly back to daily
    pub const fn next(self) -> Self {
        match self {
            Self::Daily => Self::Weekly,
            Self::Weekly => Self::Monthly,
            Self::Monthly => Self::Yearly,
            Self::Yearly => Self::Daily,
        }
    }
}

/// Clamp a scroll position to `0..=MAX_OFFSET`.
pub fn clamp_offset(offset: i64) -> u32 {
    offset.clamp(0, MAX_OFFSET as i64) as u32
}

/// Absolute time window a query covers.
///
/// Windows are half-open, `start <= t < end`, except the most recent one
/// (offset 0), which also includes `t == end` so a sample taken at `now`
/// is part of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub start: i64,
    pub end: i64,
    closed: bool,
}

impl QueryWindow {
    /// Resolve `window` at `offset` spans before `now`.
    pub fn resolve(now: i64, window: TimeWindow, offset: u32) -> Self {
        let span = window.duration_secs();
        let end = now.saturating_sub(span.saturating_mul(offset as i64));
        Self {
            start: end.saturating_sub(span),
            end,
            closed: offset == 0,
        }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start
            && (timestamp < self.end || (self.closed && timestamp == self.end))
    }
}

/// What to graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesRequest {
    pub window: TimeWindow,
    /// Whole spans back from now; 0 is the most recent span
    pub offset: u32,
    pub sensor: SensorType,
    /// Upper bound on returned points
    pub max_points: usize,
}

impl SeriesRequest {
    pub const fn new(window: TimeWindow, sensor: SensorType) -> Self {
        Self {
            window,
            offset: 0,
            sensor,
            max_points: DEFAULT_MAX_POINTS,
        }
    }

    pub const fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub const fn with_max_points(mut self, max_points: usize) -> Self {
        self.max_points = max_points;
        self
    }
}

/// Result of a range query.
#[derive(Debug, Clone, PartialEq)]
pub enum Series {
    /// At least two values, oldest first
    Points(Vec<f32>),
    /// Fewer than two values matched; show a "no data" state
    InsufficientData,
}

impl Series {
    /// Wrap `points`, mapping fewer than two to [`Series::InsufficientData`].
    pub fn from_points(points: Vec<f32>) -> Self {
        if points.len() < 2 {
            Self::InsufficientData
        } else {
            Self::Points(points)
        }
    }

    /// Values in temporal order; empty for [`Series::InsufficientData`].
    pub fn points(&self) -> &[f32] {
        match self {
            Self::Points(points) => points,
            Self::InsufficientData => &[],
        }
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self, Self::InsufficientData)
    }
}

/// Reduce `matches` to at most `max_points` evenly spaced items.
///
/// Takes every `floor(len / max_points)`-th item starting with the first. No
/// averaging; order is preserved.
///
/// With fewer than `2 * max_points` items the stride is 1, so the cap keeps
/// only the oldest `max_points` and the newest part of the window is dropped.
pub fn decimate<T>(matches: Vec<T>, max_points: usize) -> Vec<T> {
    let max_points = max_points.max(1);
    if matches.len() <= max_points {
        return matches;
    }

    let stride = matches.len() / max_points;
    matches
        .into_iter()
        .step_by(stride)
        .take(max_points)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_offsets() {
        let now = 1_000_000;

        let current = QueryWindow::resolve(now, TimeWindow::Daily, 0);
        assert_eq!(current.start, now - 86_400);
        assert_eq!(current.end, now);

        let previous = QueryWindow::resolve(now, TimeWindow::Weekly, 2);
        assert_eq!(previous.end, now - 2 * 604_800);
        assert_eq!(previous.start, now - 3 * 604_800);
    }

    #[test]
    fn test_only_latest_window_includes_its_end() {
        let now = 500_000;
        let current = QueryWindow::resolve(now, TimeWindow::Daily, 0);
        let previous = QueryWindow::resolve(now, TimeWindow::Daily, 1);

        assert!(current.contains(now));
        assert!(current.contains(now - 86_400));
        assert!(!current.contains(now - 86_401));

        // The boundary record belongs to exactly one window
        assert!(!previous.contains(now - 86_400));
        assert!(previous.contains(now - 86_401));
    }

    #[test]
    fn test_resolve_does_not_overflow() {
        let window = QueryWindow::resolve(i64::MIN + 10, TimeWindow::Yearly, u32::MAX);
        assert_eq!(window.end, i64::MIN);
        assert_eq!(window.start, i64::MIN);
    }

    #[test]
    fn test_next_cycles() {
        let mut window = TimeWindow::Daily;
        for expected in [
            TimeWindow::Weekly,
            TimeWindow::Monthly,
            TimeWindow::Yearly,
            TimeWindow::Daily,
        ] {
            window = window.next();
            assert_eq!(window, expected);
        }
    }

    #[test]
    fn test_clamp_offset() {
        assert_eq!(clamp_offset(-3), 0);
        assert_eq!(clamp_offset(42), 42);
        assert_eq!(clamp_offset(1000), MAX_OFFSET);
    }

    #[test]
    fn test_decimate_under_cap_is_untouched() {
        let values: Vec<u32> = (0..50).collect();
        assert_eq!(decimate(values.clone(), 120), values);
    }

    #[test]
    fn test_decimate_stride() {
        let values: Vec<u32> = (0..250).collect();
        let picked = decimate(values, 120);

        // stride = 250 / 120 = 2
        assert_eq!(picked.len(), 120);
        assert_eq!(&picked[..4], &[0, 2, 4, 6]);
        assert!(picked.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_decimate_truncates_to_cap() {
        let values: Vec<u32> = (0..239).collect();
        let picked = decimate(values, 120);

        // stride 1 would keep all 239; the cap still holds
        assert_eq!(picked.len(), 120);
        assert_eq!(picked[119], 119);
    }

    #[test]
    fn test_series_threshold() {
        assert!(Series::from_points(alloc::vec![1.0]).is_insufficient());
        assert!(Series::from_points(Vec::new()).is_insufficient());
        assert_eq!(
            Series::from_points(alloc::vec![1.0, 2.0]).points(),
            &[1.0, 2.0]
        );
    }
}
