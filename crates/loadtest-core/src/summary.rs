//! End-of-run summary

use std::fmt;
use std::time::{Duration, Instant};

use crate::result::RequestResult;
use crate::worker::is_success;

/// Accumulates results as they arrive.
#[derive(Debug)]
pub struct SummaryCollector {
    start_time: Instant,
    successful: usize,
    failed: usize,
    latencies_ns: Vec<u64>,
}

impl SummaryCollector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            successful: 0,
            failed: 0,
            latencies_ns: Vec::new(),
        }
    }

    pub fn record(&mut self, result: &RequestResult) {
        if is_success(result.code) {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        self.latencies_ns
            .push(result.latency.as_nanos().min(u64::MAX as u128) as u64);
    }

    /// Freeze the collected numbers. `forced` marks a run abandoned before drain.
    #[must_use]
    pub fn finish(mut self, forced: bool) -> Summary {
        self.latencies_ns.sort_unstable();
        let total = self.latencies_ns.len();

        let average_latency = if total == 0 {
            Duration::ZERO
        } else {
            let sum: u128 = self.latencies_ns.iter().map(|&ns| ns as u128).sum();
            Duration::from_nanos((sum / total as u128) as u64)
        };

        Summary {
            successful: self.successful,
            failed: self.failed,
            average_latency,
            p50_latency: percentile(&self.latencies_ns, 0.50),
            p95_latency: percentile(&self.latencies_ns, 0.95),
            p99_latency: percentile(&self.latencies_ns, 0.99),
            elapsed: self.start_time.elapsed(),
            forced,
        }
    }
}

impl Default for SummaryCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn percentile(sorted_ns: &[u64], p: f64) -> Duration {
    if sorted_ns.is_empty() {
        return Duration::ZERO;
    }
    let index = ((sorted_ns.len() as f64) * p) as usize;
    Duration::from_nanos(sorted_ns[index.min(sorted_ns.len() - 1)])
}

/// Totals for a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub successful: usize,
    pub failed: usize,
    pub average_latency: Duration,
    pub p50_latency: Duration,
    pub p95_latency: Duration,
    pub p99_latency: Duration,
    pub elapsed: Duration,
    /// The run was abandoned by a second stop request without draining.
    pub forced: bool,
}

impl Summary {
    #[must_use]
    pub fn total(&self) -> usize {
        self.successful + self.failed
    }

    /// Failed share of all requests, in percent.
    #[must_use]
    pub fn error_rate(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        self.failed as f64 / self.total() as f64 * 100.0
    }

    /// Completed requests per second of wall time.
    #[must_use]
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.total() as f64 / secs
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Successful Requests: {}, Failed Requests: {}",
            self.successful, self.failed
        )?;
        writeln!(f, "Average latency: {:?}", self.average_latency)?;
        writeln!(
            f,
            "Latency p50: {:?}, p95: {:?}, p99: {:?}",
            self.p50_latency, self.p95_latency, self.p99_latency
        )?;
        writeln!(f, "Throughput: {:.1} req/s", self.throughput())?;
        write!(f, "Error rate: {:.2}%", self.error_rate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn result(code: u16, latency_ms: u64) -> RequestResult {
        RequestResult {
            success: is_success(code),
            latency: Duration::from_millis(latency_ms),
            timestamp: Utc::now(),
            seq: 0,
            error: String::new(),
            code,
        }
    }

    #[test]
    fn test_empty_run_has_zeroes() {
        let summary = SummaryCollector::new().finish(false);
        assert_eq!(summary.total(), 0);
        assert_eq!(summary.error_rate(), 0.0);
        assert_eq!(summary.average_latency, Duration::ZERO);
        assert_eq!(summary.p99_latency, Duration::ZERO);
    }

    #[test]
    fn test_counts_and_latency() {
        let mut collector = SummaryCollector::new();
        for latency in 1..=100 {
            collector.record(&result(200, latency));
        }
        collector.record(&result(500, 1));
        collector.record(&result(0, 1));
        collector.record(&result(302, 1));

        let summary = collector.finish(false);
        assert_eq!(summary.successful, 101);
        assert_eq!(summary.failed, 2);
        assert!((summary.error_rate() - 2.0 / 103.0 * 100.0).abs() < 1e-9);
        assert_eq!(summary.p50_latency, Duration::from_millis(49));
        assert_eq!(summary.p99_latency, Duration::from_millis(99));
    }

    #[test]
    fn test_display_lines() {
        let mut collector = SummaryCollector::new();
        collector.record(&result(200, 10));
        collector.record(&result(404, 30));
        let text = collector.finish(false).to_string();

        assert!(text.contains("Successful Requests: 1, Failed Requests: 1"));
        assert!(text.contains("Average latency: 20ms"));
        assert!(text.ends_with("Error rate: 50.00%"));
    }
}
