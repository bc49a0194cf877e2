use serde::Serialize;

/// Nearest-rank percentiles over the rolling latency window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyPercentiles {
    pub count: usize,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
}

impl LatencyPercentiles {
    pub fn from_samples<I>(samples: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut sorted: Vec<f64> = samples.into_iter().collect();
        if sorted.is_empty() {
            return None;
        }

        sorted.sort_by(|a, b| a.total_cmp(b));
        let count = sorted.len();

        Some(Self {
            count,
            p50_ms: percentile_nearest_rank(&sorted, 50),
            p90_ms: percentile_nearest_rank(&sorted, 90),
            p95_ms: percentile_nearest_rank(&sorted, 95),
            p99_ms: percentile_nearest_rank(&sorted, 99),
            max_ms: sorted[count - 1],
        })
    }
}

fn percentile_nearest_rank(sorted: &[f64], percentile: usize) -> f64 {
    let count = sorted.len();
    let rank = (percentile * count).div_ceil(100);
    sorted[rank.saturating_sub(1)]
}
