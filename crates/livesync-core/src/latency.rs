//! Histogram-based latency collector for publish round-trips.
//!
//! The batch publisher records how long each `publish` call takes. Samples go
//! into fixed-width microsecond bins; anything past the last bin is clamped
//! into it (min/max/avg still use the exact values).
//!
//! The default shape is 50µs bins up to 100ms, which covers a healthy Redis
//! round-trip with room for the occasional stall.

/// Default bin width in microseconds.
pub const DEFAULT_BIN_WIDTH_US: u64 = 50;

/// Default number of bins (0–100ms at the default width).
pub const DEFAULT_NUM_BINS: usize = 2_000;

/// Computed latency statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyStats {
    pub count: u64,
    pub min_us: u64,
    pub max_us: u64,
    pub avg_us: f64,
    pub p50_us: u64,
    pub p90_us: u64,
    pub p99_us: u64,
}

impl std::fmt::Display for LatencyStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "n={} min={}µs max={}µs avg={:.1}µs p50={}µs p90={}µs p99={}µs",
            self.count, self.min_us, self.max_us, self.avg_us, self.p50_us, self.p90_us, self.p99_us,
        )
    }
}

/// A histogram-based latency collector.
///
/// Not thread-safe; the publisher actor owns its instance.
#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    bin_width_us: u64,
    bins: Vec<u64>,
    count: u64,
    sum: u64,
    min: u64,
    max: u64,
}

impl LatencyHistogram {
    /// Histogram with the default shape.
    pub fn new() -> Self {
        Self::with_shape(DEFAULT_BIN_WIDTH_US, DEFAULT_NUM_BINS)
    }

    /// Histogram with `num_bins` bins of `bin_width_us` each.
    pub fn with_shape(bin_width_us: u64, num_bins: usize) -> Self {
        Self {
            bin_width_us: bin_width_us.max(1),
            bins: vec![0; num_bins.max(1)],
            count: 0,
            sum: 0,
            min: u64::MAX,
            max: 0,
        }
    }

    #[inline]
    pub fn record(&mut self, latency_us: u64) {
        self.count += 1;
        self.sum = self.sum.saturating_add(latency_us);
        self.min = self.min.min(latency_us);
        self.max = self.max.max(latency_us);

        let bin = ((latency_us / self.bin_width_us) as usize).min(self.bins.len() - 1);
        self.bins[bin] += 1;
    }

    /// Record a [`std::time::Duration`] sample.
    pub fn record_duration(&mut self, d: std::time::Duration) {
        self.record(u64::try_from(d.as_micros()).unwrap_or(u64::MAX));
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Summary statistics, or `None` before the first sample.
    pub fn stats(&self) -> Option<LatencyStats> {
        if self.count == 0 {
            return None;
        }
        Some(LatencyStats {
            count: self.count,
            min_us: self.min,
            max_us: self.max,
            avg_us: self.sum as f64 / self.count as f64,
            p50_us: self.percentile(0.50),
            p90_us: self.percentile(0.90),
            p99_us: self.percentile(0.99),
        })
    }

    pub fn reset(&mut self) {
        self.bins.fill(0);
        self.count = 0;
        self.sum = 0;
        self.min = u64::MAX;
        self.max = 0;
    }

    /// Lower edge of the bin holding the given percentile (0.0–1.0).
    pub fn percentile(&self, pct: f64) -> u64 {
        let target = ((self.count as f64 * pct).ceil() as u64).max(1);
        let mut cumulative = 0u64;
        for (i, &n) in self.bins.iter().enumerate() {
            cumulative += n;
            if cumulative >= target {
                // The last bin is a clamp bucket; report the true max instead.
                if i == self.bins.len() - 1 {
                    return self.max;
                }
                return i as u64 * self.bin_width_us;
            }
        }
        self.max
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}
