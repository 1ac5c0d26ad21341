//! Round-trip times of health probes, kept in an HDR histogram.
//! Values stored in microseconds.

use std::sync::Mutex;
use std::time::Duration;

pub struct ProbeLatency {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

impl ProbeLatency {
    /// Tracks 1us to 60s, 3 significant figures.
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 60_000_000, 3)
            .expect("valid histogram bounds");
        Self {
            inner: Mutex::new(histogram),
        }
    }

    pub fn record(&self, d: Duration) {
        let us = d.as_micros().min(u128::from(u64::MAX)) as u64;
        if let Ok(mut h) = self.inner.lock() {
            // Out-of-range samples saturate instead of being dropped.
            h.saturating_record(us.max(1));
        }
    }

    /// (p50, p95) in milliseconds. None if no samples.
    pub fn percentiles_ms(&self) -> Option<(u64, u64)> {
        let h = self.inner.lock().ok()?;
        if h.len() == 0 {
            return None;
        }
        Some((
            h.value_at_quantile(0.5) / 1_000,
            h.value_at_quantile(0.95) / 1_000,
        ))
    }

    pub fn len(&self) -> u64 {
        self.inner.lock().map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ProbeLatency {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_has_no_percentiles() {
        let l = ProbeLatency::new();
        assert!(l.is_empty());
        assert!(l.percentiles_ms().is_none());
    }

    #[test]
    fn percentiles_in_millis() {
        let l = ProbeLatency::new();
        for ms in [10, 20, 30, 40, 1_000] {
            l.record(Duration::from_millis(ms));
        }
        let (p50, p95) = l.percentiles_ms().unwrap();
        assert_eq!(l.len(), 5);
        assert!((29..=31).contains(&p50), "p50 = {p50}");
        assert!(p95 >= 990, "p95 = {p95}");
    }
}
