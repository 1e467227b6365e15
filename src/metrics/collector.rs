use std::collections::HashMap;

use parking_lot::Mutex;

use super::snapshot::MetricsSnapshot;
use super::{Bucket, BucketKey, CallRecord, MetricsMap, StatusClass};

// ─── Public types ────────────────────────────────────────────────

/// Thread-safe aggregation table.
/// The interceptor calls `record()`, the scheduler calls `snapshot_and_reset()`.
/// Both take the same lock, so a sample lands in exactly one snapshot.
pub struct MetricsCollector {
    namespace: String,
    inner: Mutex<HashMap<BucketKey, Bucket>>,
}

// ─── MetricsCollector impl ───────────────────────────────────────

impl MetricsCollector {
    /// `namespace` is the first segment of every reported metric name.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Record a single observation into its exact and family buckets,
    /// or into the `error` bucket when there is no status.
    pub fn record(&self, service: &str, status: Option<u16>, duration_ms: f64) {
        let mut table = self.inner.lock();
        for class in StatusClass::for_status(status) {
            let key = BucketKey::new(service, class);
            table.entry(key).or_default().push(duration_ms);
        }
    }

    pub fn observe(&self, record: &CallRecord) {
        let status = if record.failed { None } else { record.status };
        self.record(&record.service, status, record.duration_ms);
    }

    /// Capture the whole table and leave an empty one behind.
    pub fn snapshot_and_reset(&self) -> MetricsSnapshot {
        let drained = std::mem::take(&mut *self.inner.lock());
        MetricsSnapshot::new(drained)
    }

    /// Drain and flatten into named metrics under this collector's namespace.
    pub fn reporter(&self) -> MetricsMap {
        self.snapshot_and_reset().to_metrics_map(&self.namespace)
    }
}
