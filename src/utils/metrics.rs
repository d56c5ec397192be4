use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Latency samples kept for avg/p50/p95; older samples are discarded
const LATENCY_WINDOW: usize = 1024;

/// Global metrics collector for the service.
///
/// Tracks request counts, removal outcomes and latency, and batch queue
/// activity. Cheap to clone; all clones share the same counters.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // Removal metrics
    images_processed: AtomicUsize,
    processing_failures: AtomicUsize,
    processing_latency_ms: RwLock<VecDeque<u64>>,

    // Validation
    validation_rejections: AtomicUsize,

    // Batch queue
    batches_submitted: AtomicUsize,
    files_queued: AtomicUsize,
    files_dropped: AtomicUsize,

    // Per-endpoint request counters
    endpoint_counters: DashMap<String, AtomicUsize>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                images_processed: AtomicUsize::new(0),
                processing_failures: AtomicUsize::new(0),
                processing_latency_ms: RwLock::new(VecDeque::with_capacity(LATENCY_WINDOW)),
                validation_rejections: AtomicUsize::new(0),
                batches_submitted: AtomicUsize::new(0),
                files_queued: AtomicUsize::new(0),
                files_dropped: AtomicUsize::new(0),
                endpoint_counters: DashMap::new(),
                start_time: Instant::now(),
            }),
        }
    }

    pub fn record_processing(&self, success: bool, duration: Duration) {
        if success {
            self.inner.images_processed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.processing_failures.fetch_add(1, Ordering::Relaxed);
        }
        let mut latency = self.inner.processing_latency_ms.write();
        if latency.len() == LATENCY_WINDOW {
            latency.pop_front();
        }
        latency.push_back(duration.as_millis() as u64);
    }

    pub fn record_validation_rejection(&self) {
        self.inner.validation_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// A batch was accepted with `queued` files after dropping `dropped`
    pub fn record_batch_submitted(&self, queued: usize, dropped: usize) {
        self.inner.batches_submitted.fetch_add(1, Ordering::Relaxed);
        self.inner.files_queued.fetch_add(queued, Ordering::Relaxed);
        self.inner.files_dropped.fetch_add(dropped, Ordering::Relaxed);
    }

    pub fn record_endpoint_request(&self, endpoint: &str) {
        self.inner
            .endpoint_counters
            .entry(endpoint.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn endpoint_requests(&self, endpoint: &str) -> usize {
        self.inner
            .endpoint_counters
            .get(endpoint)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let latency: Vec<u64> = self.inner.processing_latency_ms.read().iter().copied().collect();
        let processing_latency_avg_ms = avg(&latency);
        let processing_latency_p50_ms = percentile(&latency, 0.5);
        let processing_latency_p95_ms = percentile(&latency, 0.95);

        let mut endpoint_requests: Vec<(String, usize)> = self
            .inner
            .endpoint_counters
            .iter()
            .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
            .collect();
        endpoint_requests.sort();

        MetricsSnapshot {
            images_processed: self.inner.images_processed.load(Ordering::Relaxed),
            processing_failures: self.inner.processing_failures.load(Ordering::Relaxed),
            processing_latency_avg_ms,
            processing_latency_p50_ms,
            processing_latency_p95_ms,
            validation_rejections: self.inner.validation_rejections.load(Ordering::Relaxed),
            batches_submitted: self.inner.batches_submitted.load(Ordering::Relaxed),
            files_queued: self.inner.files_queued.load(Ordering::Relaxed),
            files_dropped: self.inner.files_dropped.load(Ordering::Relaxed),
            endpoint_requests,
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Generate Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = format!(
            r#"# HELP images_processed_total Images whose background was removed
# TYPE images_processed_total counter
images_processed_total {}

# HELP processing_failures_total Removal attempts that failed or timed out
# TYPE processing_failures_total counter
processing_failures_total {}

# HELP processing_latency_avg_ms Average removal latency in milliseconds
# TYPE processing_latency_avg_ms gauge
processing_latency_avg_ms {}
processing_latency_p50_ms {}
processing_latency_p95_ms {}

# HELP validation_rejections_total Uploads rejected by validation
# TYPE validation_rejections_total counter
validation_rejections_total {}

# HELP batches_submitted_total Accepted batch submissions
# TYPE batches_submitted_total counter
batches_submitted_total {}

# HELP files_queued_total Files appended to the batch queue
# TYPE files_queued_total counter
files_queued_total {}

# HELP files_dropped_total Batch files dropped by validation
# TYPE files_dropped_total counter
files_dropped_total {}

# HELP uptime_seconds Service uptime in seconds
# TYPE uptime_seconds counter
uptime_seconds {}
"#,
            snapshot.images_processed,
            snapshot.processing_failures,
            snapshot.processing_latency_avg_ms,
            snapshot.processing_latency_p50_ms,
            snapshot.processing_latency_p95_ms,
            snapshot.validation_rejections,
            snapshot.batches_submitted,
            snapshot.files_queued,
            snapshot.files_dropped,
            snapshot.uptime_seconds,
        );

        if !snapshot.endpoint_requests.is_empty() {
            out.push_str("\n# HELP http_requests_total Requests per endpoint\n");
            out.push_str("# TYPE http_requests_total counter\n");
            for (endpoint, count) in &snapshot.endpoint_requests {
                out.push_str(&format!(
                    "http_requests_total{{endpoint=\"{}\"}} {}\n",
                    endpoint, count
                ));
            }
        }

        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub images_processed: usize,
    pub processing_failures: usize,
    pub processing_latency_avg_ms: u64,
    pub processing_latency_p50_ms: u64,
    pub processing_latency_p95_ms: u64,
    pub validation_rejections: usize,
    pub batches_submitted: usize,
    pub files_queued: usize,
    pub files_dropped: usize,
    pub endpoint_requests: Vec<(String, usize)>,
    pub uptime_seconds: u64,
}

fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((values.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn avg(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = Metrics::new();

        metrics.record_processing(true, Duration::from_millis(100));
        metrics.record_processing(false, Duration::from_millis(300));
        metrics.record_validation_rejection();
        metrics.record_batch_submitted(2, 1);
        metrics.record_endpoint_request("/health");
        metrics.record_endpoint_request("/health");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.images_processed, 1);
        assert_eq!(snapshot.processing_failures, 1);
        assert_eq!(snapshot.processing_latency_avg_ms, 200);
        assert_eq!(snapshot.validation_rejections, 1);
        assert_eq!(snapshot.batches_submitted, 1);
        assert_eq!(snapshot.files_queued, 2);
        assert_eq!(snapshot.files_dropped, 1);
        assert_eq!(metrics.endpoint_requests("/health"), 2);
        assert_eq!(metrics.endpoint_requests("/metrics"), 0);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.record_processing(true, Duration::from_millis(100));
        metrics.record_endpoint_request("/remove-bg");

        let prometheus = metrics.to_prometheus();
        assert!(prometheus.contains("images_processed_total 1"));
        assert!(prometheus.contains("http_requests_total{endpoint=\"/remove-bg\"} 1"));
    }

    #[test]
    fn test_latency_window_is_bounded() {
        let metrics = Metrics::new();
        for _ in 0..LATENCY_WINDOW {
            metrics.record_processing(true, Duration::from_millis(1000));
        }
        for _ in 0..LATENCY_WINDOW {
            metrics.record_processing(true, Duration::from_millis(10));
        }

        assert_eq!(metrics.inner.processing_latency_ms.read().len(), LATENCY_WINDOW);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.processing_latency_avg_ms, 10);
        assert_eq!(snapshot.processing_latency_p95_ms, 10);
        assert_eq!(snapshot.images_processed, 2 * LATENCY_WINDOW);
    }

    #[test]
    fn test_percentile_empty() {
        assert_eq!(percentile(&[], 0.5), 0);
        assert_eq!(percentile(&[5, 1, 3], 0.5), 3);
    }
}
