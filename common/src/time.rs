// Timing utilities for low-latency measurement

use std::sync::OnceLock;
use std::time::Instant;

/// Global anchor point for converting Instant to nanoseconds
static EPOCH: OnceLock<Instant> = OnceLock::new();

fn get_epoch() -> &'static Instant {
    EPOCH.get_or_init(Instant::now)
}

/// Nanosecond-precision monotonic timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Nanos(pub u64);

impl Nanos {
    #[inline]
    pub const fn new(nanos: u64) -> Self {
        Self(nanos)
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Elapsed nanoseconds since this timestamp
    #[inline]
    pub fn elapsed(self) -> u64 {
        nanos_since(self)
    }
}

impl std::ops::Sub for Nanos {
    type Output = u64;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        self.0.saturating_sub(rhs.0)
    }
}

impl From<u64> for Nanos {
    #[inline]
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Current time in nanoseconds since an arbitrary process-local epoch.
/// Monotonic (backed by `Instant`).
#[inline]
pub fn now_nanos() -> Nanos {
    let epoch = get_epoch();
    let elapsed = Instant::now().duration_since(*epoch);
    Nanos(elapsed.as_nanos() as u64)
}

/// Elapsed nanoseconds since `start`
#[inline]
pub fn nanos_since(start: Nanos) -> u64 {
    now_nanos().0.saturating_sub(start.0)
}

/// Running min/mean/max latency tracker
#[derive(Debug, Clone)]
pub struct LatencyStats {
    count: u64,
    sum: u64,
    min: u64,
    max: u64,
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyStats {
    #[inline]
    pub const fn new() -> Self {
        Self {
            count: 0,
            sum: 0,
            min: u64::MAX,
            max: 0,
        }
    }

    #[inline]
    pub fn record(&mut self, latency_nanos: u64) {
        self.count += 1;
        self.sum = self.sum.saturating_add(latency_nanos);
        self.min = self.min.min(latency_nanos);
        self.max = self.max.max(latency_nanos);
    }

    #[inline]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Mean latency in nanoseconds; 0.0 with no measurements.
    #[inline]
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }

    #[inline]
    pub const fn min(&self) -> u64 {
        self.min
    }

    #[inline]
    pub const fn max(&self) -> u64 {
        self.max
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Scoped timer that records its elapsed time into a `LatencyStats` on drop
pub struct ScopedTimer<'a> {
    stats: &'a mut LatencyStats,
    start: Nanos,
}

impl<'a> ScopedTimer<'a> {
    #[inline]
    pub fn new(stats: &'a mut LatencyStats) -> Self {
        Self {
            stats,
            start: now_nanos(),
        }
    }

    #[inline]
    pub fn elapsed(&self) -> u64 {
        nanos_since(self.start)
    }
}

impl Drop for ScopedTimer<'_> {
    #[inline]
    fn drop(&mut self) {
        let elapsed = nanos_since(self.start);
        self.stats.record(elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nanos_basics() {
        let n = Nanos::new(12345);
        assert_eq!(n.as_u64(), 12345);
        assert_eq!(Nanos::from(10) - Nanos::from(4), 6);
        // Saturating: never underflows
        assert_eq!(Nanos::from(4) - Nanos::from(10), 0);
    }

    #[test]
    fn test_now_is_monotonic() {
        let a = now_nanos();
        let b = now_nanos();
        assert!(b >= a);
        assert!(a.elapsed() >= b - a);
    }

    #[test]
    fn test_latency_stats() {
        let mut stats = LatencyStats::new();
        assert_eq!(stats.count(), 0);
        assert_eq!(stats.mean(), 0.0);

        stats.record(100);
        stats.record(200);
        stats.record(300);

        assert_eq!(stats.count(), 3);
        assert_eq!(stats.min(), 100);
        assert_eq!(stats.max(), 300);
        assert_eq!(stats.mean(), 200.0);

        stats.reset();
        assert_eq!(stats.count(), 0);
        assert_eq!(stats.max(), 0);
    }

    #[test]
    fn test_scoped_timer_records_on_drop() {
        let mut stats = LatencyStats::new();
        {
            let timer = ScopedTimer::new(&mut stats);
            let _ = timer.elapsed();
        }
        assert_eq!(stats.count(), 1);
    }
}
