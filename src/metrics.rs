use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A simple percentile tracker that maintains a sliding window of measurements
#[derive(Debug, Clone)]
pub struct PercentileTracker {
    measurements: Arc<Mutex<VecDeque<u64>>>,
    window_size: usize,
}

impl PercentileTracker {
    /// Create a new percentile tracker with a specified window size
    pub fn new(window_size: usize) -> Self {
        Self {
            measurements: Arc::new(Mutex::new(VecDeque::with_capacity(window_size))),
            window_size,
        }
    }

    /// Record a measurement (in nanoseconds)
    pub fn record(&self, nanos: u64) {
        let mut measurements = self.measurements.lock();
        if measurements.len() >= self.window_size {
            measurements.pop_front();
        }
        measurements.push_back(nanos);
    }

    /// Calculate the p50 (median) latency in microseconds
    pub fn p50_us(&self) -> f64 {
        self.percentile(0.50)
    }

    /// Calculate the p95 (95th percentile) latency in microseconds
    pub fn p95_us(&self) -> f64 {
        self.percentile(0.95)
    }

    /// Calculate the p99 (99th percentile) latency in microseconds
    pub fn p99_us(&self) -> f64 {
        self.percentile(0.99)
    }

    fn percentile(&self, p: f64) -> f64 {
        let measurements = self.measurements.lock();
        if measurements.is_empty() {
            return 0.0;
        }

        let mut sorted: Vec<_> = measurements.iter().copied().collect();
        sorted.sort_unstable();

        let idx = ((sorted.len() as f64 * p).ceil() as usize).saturating_sub(1);
        sorted[idx] as f64 / 1000.0 // Convert nanoseconds to microseconds
    }

    /// Get the count of recorded measurements
    pub fn count(&self) -> usize {
        self.measurements.lock().len()
    }
}

/// Per-stage metrics collector
///
/// Every worker in a stage's pool records into the same collector; handles
/// are cheap clones sharing the underlying counters. Failure counts are the
/// observability channel for per-item drops.
#[derive(Debug, Clone)]
pub struct StageMetrics {
    /// Number of payloads whose callback succeeded
    items_processed: Arc<AtomicU64>,
    /// Number of payloads dropped because their callback failed
    items_failed: Arc<AtomicU64>,
    /// Callback latency percentiles (p50, p95, p99)
    latency_tracker: PercentileTracker,
    /// Creation time for throughput calculation
    start_time: Instant,
}

impl StageMetrics {
    /// Create a new metrics collector for a stage
    pub fn new() -> Self {
        Self {
            items_processed: Arc::new(AtomicU64::new(0)),
            items_failed: Arc::new(AtomicU64::new(0)),
            latency_tracker: PercentileTracker::new(1000),
            start_time: Instant::now(),
        }
    }

    /// Record a successfully processed payload
    pub fn record_processed(&self) {
        self.items_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a payload dropped on callback failure
    pub fn record_failed(&self) {
        self.items_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a callback latency measurement in nanoseconds
    pub fn record_latency(&self, nanos: u64) {
        self.latency_tracker.record(nanos);
    }

    /// Get the total number of successfully processed payloads
    pub fn total_processed(&self) -> u64 {
        self.items_processed.load(Ordering::Relaxed)
    }

    /// Get the total number of dropped payloads
    pub fn total_failed(&self) -> u64 {
        self.items_failed.load(Ordering::Relaxed)
    }

    /// Calculate current throughput in payloads per second
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed();
        let total = self.total_processed();
        if elapsed.as_secs_f64() == 0.0 {
            0.0
        } else {
            total as f64 / elapsed.as_secs_f64()
        }
    }

    /// Get P50 callback latency in microseconds
    pub fn latency_p50_us(&self) -> f64 {
        self.latency_tracker.p50_us()
    }

    /// Get P95 callback latency in microseconds
    pub fn latency_p95_us(&self) -> f64 {
        self.latency_tracker.p95_us()
    }

    /// Get P99 callback latency in microseconds
    pub fn latency_p99_us(&self) -> f64 {
        self.latency_tracker.p99_us()
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_processed: self.total_processed(),
            total_failed: self.total_failed(),
            throughput: self.throughput(),
            latency_p50_us: self.latency_p50_us(),
            latency_p95_us: self.latency_p95_us(),
            latency_p99_us: self.latency_p99_us(),
            elapsed: self.start_time.elapsed(),
        }
    }
}

impl Default for StageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub total_processed: u64,
    pub total_failed: u64,
    pub throughput: f64,
    pub latency_p50_us: f64,
    pub latency_p95_us: f64,
    pub latency_p99_us: f64,
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    /// Format metrics as a human-readable string
    pub fn format(&self) -> String {
        format!(
            "Processed: {}, Failed: {}, Throughput: {:.2} items/s, \
             Latency P50: {:.2}µs, P95: {:.2}µs, P99: {:.2}µs, Elapsed: {:.2}s",
            self.total_processed,
            self.total_failed,
            self.throughput,
            self.latency_p50_us,
            self.latency_p95_us,
            self.latency_p99_us,
            self.elapsed.as_secs_f64()
        )
    }
}
