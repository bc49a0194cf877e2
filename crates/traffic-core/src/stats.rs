use std::{collections::VecDeque, time::Duration};

/// Number of most recent latency samples kept for averaging.
pub const LATENCY_WINDOW_CAPACITY: usize = 100;

/// Raw counters of one controller's lifetime. Derived rates are computed on
/// demand and never stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    requests_issued: u64,
    success_count: u64,
    error_count: u64,
    latency_samples: VecDeque<f64>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one completed request. Non-finite or negative latencies are
    /// stored as zero.
    pub fn record_outcome(&mut self, success: bool, latency_ms: f64) {
        self.requests_issued += 1;
        if success {
            self.success_count += 1;
        } else {
            self.error_count += 1;
        }

        let latency_ms = if latency_ms.is_finite() {
            latency_ms.max(0.0)
        } else {
            0.0
        };
        self.latency_samples.push_back(latency_ms);
        while self.latency_samples.len() > LATENCY_WINDOW_CAPACITY {
            self.latency_samples.pop_front();
        }
    }

    pub fn requests_issued(&self) -> u64 {
        self.requests_issued
    }

    pub fn success_count(&self) -> u64 {
        self.success_count
    }

    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    /// Oldest first.
    pub fn latency_samples(&self) -> &VecDeque<f64> {
        &self.latency_samples
    }

    /// `requests_issued` per minute of `elapsed`; zero without a start time or
    /// with zero elapsed time.
    pub fn requests_per_minute(&self, elapsed: Option<Duration>) -> f64 {
        let Some(elapsed) = elapsed else {
            return 0.0;
        };
        let elapsed_minutes = elapsed.as_secs_f64() / 60.0;
        if elapsed_minutes <= 0.0 {
            return 0.0;
        }

        self.requests_issued as f64 / elapsed_minutes
    }

    pub fn error_rate_pct(&self) -> f64 {
        if self.requests_issued == 0 {
            return 0.0;
        }

        self.error_count as f64 / self.requests_issued as f64 * 100.0
    }

    pub fn average_latency_ms(&self) -> f64 {
        if self.latency_samples.is_empty() {
            return 0.0;
        }

        self.latency_samples.iter().sum::<f64>() / self.latency_samples.len() as f64
    }
}
