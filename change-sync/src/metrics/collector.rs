//! Process-wide pipeline counters and processing-time statistics.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

/// Number of recent processing durations kept for the statistics.
pub const DURATION_WINDOW_CAPACITY: usize = 1000;

/// Processing-time statistics over the duration window, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationStats {
    pub samples: usize,
    pub average_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
}

impl DurationStats {
    /// Compute statistics with nearest-rank percentiles.
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let sum: f64 = sorted.iter().sum();
        Self {
            samples: sorted.len(),
            average_ms: sum / sorted.len() as f64,
            median_ms: nearest_rank(&sorted, 50.0),
            p95_ms: nearest_rank(&sorted, 95.0),
            p99_ms: nearest_rank(&sorted, 99.0),
            max_ms: sorted[sorted.len() - 1],
        }
    }
}

fn nearest_rank(sorted: &[f64], percentile: f64) -> f64 {
    let rank = ((percentile / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Point-in-time view of the collector.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub received: u64,
    pub processed: u64,
    pub failed: u64,
    /// `failed / (processed + failed)`, zero before anything completes.
    pub error_rate: f64,
    pub processing_time: DurationStats,
    /// When counting started (process start or last reset).
    pub since: DateTime<Utc>,
    pub captured_at: DateTime<Utc>,
}

/// Thread-safe pipeline metrics.
///
/// Counters are atomics; the duration window sits behind a mutex that is held only
/// to push or copy samples. Shared through an `Arc` by every pipeline stage.
pub struct MetricsCollector {
    received: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
    durations: Mutex<VecDeque<f64>>,
    capacity: usize,
    since: Mutex<DateTime<Utc>>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::with_capacity(DURATION_WINDOW_CAPACITY)
    }

    /// Create a collector with a custom duration window size.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            received: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            durations: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            since: Mutex::new(Utc::now()),
        }
    }

    /// Count messages or raw events entering the pipeline.
    pub fn record_received(&self, count: u64) {
        self.received.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a failure that never reached processing (e.g. a rejected message).
    pub fn record_rejected(&self, count: u64) {
        self.failed.fetch_add(count, Ordering::Relaxed);
    }

    /// Record the outcome of a batch. The batch duration is one window sample.
    pub fn record_batch(&self, processed: u64, failed: u64, duration: Duration) {
        self.processed.fetch_add(processed, Ordering::Relaxed);
        self.failed.fetch_add(failed, Ordering::Relaxed);
        if processed + failed > 0 {
            self.push_duration(duration);
        }
    }

    fn push_duration(&self, duration: Duration) {
        let mut window = self.window();
        if window.len() == self.capacity {
            window.pop_front();
        }
        window.push_back(duration.as_secs_f64() * 1000.0);
    }

    fn window(&self) -> MutexGuard<'_, VecDeque<f64>> {
        // Samples are plain floats; a poisoned lock still holds a usable window.
        self.durations.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take a consistent-enough snapshot of every counter and the window statistics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let processed = self.processed.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let samples: Vec<f64> = self.window().iter().copied().collect();

        MetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            processed,
            failed,
            error_rate: error_rate(processed, failed),
            processing_time: DurationStats::from_samples(&samples),
            since: *self.since.lock().unwrap_or_else(|e| e.into_inner()),
            captured_at: Utc::now(),
        }
    }

    /// Current error rate without building a full snapshot.
    pub fn error_rate(&self) -> f64 {
        error_rate(
            self.processed.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
        )
    }

    /// Zero every counter and clear the duration window.
    pub fn reset(&self) {
        self.received.store(0, Ordering::Relaxed);
        self.processed.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.window().clear();
        *self.since.lock().unwrap_or_else(|e| e.into_inner()) = Utc::now();
        info!("Metrics reset");
    }
}

/// `failed / (processed + failed)`, or zero when nothing has completed.
pub fn error_rate(processed: u64, failed: u64) -> f64 {
    let total = processed + failed;
    if total == 0 {
        0.0
    } else {
        failed as f64 / total as f64
    }
}
