//! Reserve call metrics
//!
//! Tracks per-call latency and success rate across fetch passes.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::RwLock;

/// Maximum number of samples to keep for metrics calculation
const MAX_SAMPLES: usize = 200;

/// Snapshot of reserve call health
#[derive(Debug, Clone, PartialEq)]
pub struct FetchMetrics {
    /// Name of the chain client
    pub client_name: String,
    /// 50th percentile latency of successful calls in milliseconds
    pub latency_p50_ms: f64,
    /// 99th percentile latency of successful calls in milliseconds
    pub latency_p99_ms: f64,
    /// Success rate (0.0 to 1.0)
    pub success_rate: f64,
    /// Total number of calls tracked
    pub total_calls: u64,
    /// Number of failed calls
    pub failed_calls: u64,
    /// Number of completed passes
    pub passes: u64,
}

impl FetchMetrics {
    /// Creates metrics with no data
    pub fn empty(client_name: &str) -> Self {
        Self {
            client_name: client_name.to_string(),
            latency_p50_ms: 0.0,
            latency_p99_ms: 0.0,
            success_rate: 1.0,
            total_calls: 0,
            failed_calls: 0,
            passes: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct LatencySample {
    duration_ms: f64,
    success: bool,
}

#[derive(Debug, Default)]
struct Counters {
    samples: VecDeque<LatencySample>,
    total_calls: u64,
    failed_calls: u64,
    passes: u64,
}

/// Collects and computes metrics for reserve calls
pub struct MetricsCollector {
    client_name: String,
    counters: RwLock<Counters>,
}

impl MetricsCollector {
    /// Creates a new metrics collector for a client
    pub fn new(client_name: &str) -> Self {
        Self {
            client_name: client_name.to_string(),
            counters: RwLock::new(Counters {
                samples: VecDeque::with_capacity(MAX_SAMPLES),
                ..Counters::default()
            }),
        }
    }

    /// Records one reserve call with its duration and success status
    pub async fn record_call(&self, duration: Duration, success: bool) {
        let mut counters = self.counters.write().await;
        counters.total_calls += 1;
        if !success {
            counters.failed_calls += 1;
        }

        if counters.samples.len() >= MAX_SAMPLES {
            counters.samples.pop_front();
        }
        counters.samples.push_back(LatencySample {
            duration_ms: duration.as_secs_f64() * 1000.0,
            success,
        });
    }

    /// Records that a full pass finished
    pub async fn record_pass(&self) {
        self.counters.write().await.passes += 1;
    }

    /// Computes current metrics from collected samples
    pub async fn get_metrics(&self) -> FetchMetrics {
        let counters = self.counters.read().await;

        if counters.samples.is_empty() {
            let mut empty = FetchMetrics::empty(&self.client_name);
            empty.passes = counters.passes;
            return empty;
        }

        let mut latencies: Vec<f64> = counters
            .samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.duration_ms)
            .collect();
        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let success_rate = if counters.total_calls > 0 {
            (counters.total_calls - counters.failed_calls) as f64 / counters.total_calls as f64
        } else {
            1.0
        };

        FetchMetrics {
            client_name: self.client_name.clone(),
            latency_p50_ms: percentile(&latencies, 50.0),
            latency_p99_ms: percentile(&latencies, 99.0),
            success_rate,
            total_calls: counters.total_calls,
            failed_calls: counters.failed_calls,
            passes: counters.passes,
        }
    }
}

/// Calculate percentile from sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metrics_collector() {
        let collector = MetricsCollector::new("test");

        collector.record_call(Duration::from_millis(100), true).await;
        collector.record_call(Duration::from_millis(200), true).await;
        collector.record_call(Duration::from_millis(150), false).await;
        collector.record_pass().await;

        let metrics = collector.get_metrics().await;

        assert_eq!(metrics.client_name, "test");
        assert_eq!(metrics.total_calls, 3);
        assert_eq!(metrics.failed_calls, 1);
        assert_eq!(metrics.passes, 1);
        assert!(metrics.success_rate > 0.6 && metrics.success_rate < 0.7);
    }

    #[tokio::test]
    async fn test_empty_collector_reports_full_success() {
        let metrics = MetricsCollector::new("idle").get_metrics().await;
        assert_eq!(metrics, FetchMetrics::empty("idle"));
    }

    #[test]
    fn test_percentile() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        assert_eq!(percentile(&values, 50.0), 5.0);
        assert_eq!(percentile(&values, 99.0), 9.0);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }
}
