//! Request metrics collection and reporting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use exposure_common::Metric;
use metrics::{counter, histogram};
use serde::Serialize;
use tokio::sync::RwLock;

/// How a simulation request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Completed,
    Cancelled,
    Failed,
}

impl RequestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestOutcome::Completed => "completed",
            RequestOutcome::Cancelled => "cancelled",
            RequestOutcome::Failed => "failed",
        }
    }
}

/// Metrics collector for the exposure API.
#[derive(Debug)]
pub struct MetricsCollector {
    pub requests: AtomicU64,
    pub completed: AtomicU64,
    pub cancelled: AtomicU64,
    pub failed: AtomicU64,

    /// Completed-request timings per metric
    timings: RwLock<HashMap<Metric, TimingStats>>,

    start_time: Instant,
}

#[derive(Debug, Default)]
struct TimingStats {
    count: u64,
    total_us: u64,
    min_us: u64,
    max_us: u64,
    last_us: u64,
}

impl TimingStats {
    fn record(&mut self, duration_us: u64) {
        self.count += 1;
        self.total_us += duration_us;
        self.last_us = duration_us;
        if self.min_us == 0 || duration_us < self.min_us {
            self.min_us = duration_us;
        }
        if duration_us > self.max_us {
            self.max_us = duration_us;
        }
    }

    fn avg_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.total_us as f64 / self.count as f64) / 1000.0
        }
    }

    fn snapshot(&self) -> TimingSnapshot {
        TimingSnapshot {
            count: self.count,
            avg_ms: self.avg_ms(),
            min_ms: self.min_us as f64 / 1000.0,
            max_ms: self.max_us as f64 / 1000.0,
            last_ms: self.last_us as f64 / 1000.0,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            timings: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record one finished simulation request.
    pub async fn record_request(&self, metric: Metric, duration_us: u64, outcome: RequestOutcome) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let slot = match outcome {
            RequestOutcome::Completed => &self.completed,
            RequestOutcome::Cancelled => &self.cancelled,
            RequestOutcome::Failed => &self.failed,
        };
        slot.fetch_add(1, Ordering::Relaxed);

        counter!(
            "exposure_requests_total",
            "metric" => metric.as_str(),
            "outcome" => outcome.as_str()
        )
        .increment(1);

        if outcome == RequestOutcome::Completed {
            histogram!("exposure_request_duration_by_metric_ms", "metric" => metric.as_str())
                .record(duration_us as f64 / 1000.0);
            let mut timings = self.timings.write().await;
            timings.entry(metric).or_default().record(duration_us);
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub async fn snapshot(&self) -> RequestMetricsSnapshot {
        let timings = self.timings.read().await;
        RequestMetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            requests: self.requests.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            by_metric: Metric::ALL
                .iter()
                .filter_map(|m| timings.get(m).map(|t| (m.to_string(), t.snapshot())))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimingSnapshot {
    pub count: u64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub last_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestMetricsSnapshot {
    pub uptime_secs: u64,
    pub requests: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub failed: u64,
    pub by_metric: HashMap<String, TimingSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_and_snapshot() {
        let collector = MetricsCollector::new();
        collector
            .record_request(Metric::Sky, 2_000, RequestOutcome::Completed)
            .await;
        collector
            .record_request(Metric::Sky, 4_000, RequestOutcome::Completed)
            .await;
        collector
            .record_request(Metric::Wind, 1_000, RequestOutcome::Cancelled)
            .await;

        let snap = collector.snapshot().await;
        assert_eq!(snap.requests, 3);
        assert_eq!(snap.completed, 2);
        assert_eq!(snap.cancelled, 1);
        let sky = &snap.by_metric["sky"];
        assert_eq!(sky.count, 2);
        assert_eq!(sky.avg_ms, 3.0);
        assert_eq!(sky.min_ms, 2.0);
        assert_eq!(sky.max_ms, 4.0);
        assert!(!snap.by_metric.contains_key("wind"));
    }
}
