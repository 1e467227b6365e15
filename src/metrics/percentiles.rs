/// A complete latency breakdown for one bucket.
/// Values are milliseconds; `count` is the number of samples.
#[derive(Debug, Clone, PartialEq)]
pub struct PercentileSet {
    pub count: u64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub p95: f64,
    pub p99: f64,
}

impl PercentileSet {
    /// Summarize a bucket's buffered samples using the nearest-rank method.
    /// Returns `None` for an empty bucket so callers can omit it entirely.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let sum: f64 = sorted.iter().sum();

        Some(Self {
            count: sorted.len() as u64,
            mean: sum / sorted.len() as f64,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            median: nearest_rank(&sorted, 50),
            p95: nearest_rank(&sorted, 95),
            p99: nearest_rank(&sorted, 99),
        })
    }

    /// `(suffix, value)` pairs in the order they are reported.
    pub fn response_times(&self) -> [(&'static str, f64); 6] {
        [
            ("mean", self.mean),
            ("min", self.min),
            ("max", self.max),
            ("median", self.median),
            ("95th", self.p95),
            ("99th", self.p99),
        ]
    }
}

/// Value at rank `ceil(p/100 * n) - 1`, clamped to `[0, n-1]`.
///
/// The rank is computed on integers: `0.95 * 20` is not exactly 19 in
/// floating point and would round up to the wrong sample.
fn nearest_rank(sorted: &[f64], percentile: usize) -> f64 {
    let n = sorted.len();
    let rank = (percentile * n).div_ceil(100);
    sorted[rank.saturating_sub(1).min(n - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_evenly_spaced_samples() {
        let set = PercentileSet::from_samples(&[50.0, 10.0, 40.0, 20.0, 30.0]).unwrap();

        assert_eq!(set.count, 5);
        assert_eq!(set.mean, 30.0);
        assert_eq!(set.min, 10.0);
        assert_eq!(set.max, 50.0);
        assert_eq!(set.median, 30.0);
        assert_eq!(set.p95, 50.0);
        assert_eq!(set.p99, 50.0);
    }

    #[test]
    fn single_sample_collapses_every_statistic() {
        let set = PercentileSet::from_samples(&[12.5]).unwrap();

        assert_eq!(set.count, 1);
        for (_, value) in set.response_times() {
            assert_eq!(value, 12.5);
        }
    }

    #[test]
    fn empty_bucket_is_omitted() {
        assert!(PercentileSet::from_samples(&[]).is_none());
    }

    #[test]
    fn rank_is_exact_on_multiples_of_twenty() {
        let samples: Vec<f64> = (1..=20).map(f64::from).collect();
        let set = PercentileSet::from_samples(&samples).unwrap();

        // ceil(0.95 * 20) = 19 → index 18
        assert_eq!(set.p95, 19.0);
        assert_eq!(set.p99, 20.0);
        assert_eq!(set.median, 10.0);
    }

    #[test]
    fn two_samples_median_is_the_lower() {
        let set = PercentileSet::from_samples(&[8.0, 4.0]).unwrap();
        assert_eq!(set.median, 4.0);
        assert_eq!(set.p95, 8.0);
    }
}
