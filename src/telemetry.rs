use std::sync::Arc;

use crate::classifier::Classifier;
use crate::error::InstrumentationError;
use crate::fetch::{FetchHandle, Fetcher};
use crate::metrics::{MetricsCollector, MetricsMap, MetricsSnapshot};
use crate::middleware::{FetchInterceptor, InstrumentOptions};
use crate::scheduler::MetricsSource;

/// Outbound call metrics: one classifier, one collector and the interceptor
/// tying them to a fetch handle. Reports under the `fetch` namespace.
pub struct FetchMetrics {
    collector: Arc<MetricsCollector>,
    interceptor: FetchInterceptor,
}

impl FetchMetrics {
    pub const NAMESPACE: &'static str = "fetch";

    pub fn new(handle: Arc<FetchHandle>, classifier: Classifier) -> Self {
        let collector = Arc::new(MetricsCollector::new(Self::NAMESPACE));
        let interceptor = FetchInterceptor::new(handle, Arc::new(classifier), collector.clone());
        Self {
            collector,
            interceptor,
        }
    }

    pub fn instrument(&self, options: InstrumentOptions) -> Result<(), InstrumentationError> {
        self.interceptor.instrument(options)
    }

    pub fn restore(&self) -> Result<Arc<dyn Fetcher>, InstrumentationError> {
        self.interceptor.restore()
    }

    pub fn is_instrumented(&self) -> bool {
        self.interceptor.is_instrumented()
    }

    /// Manual observation, e.g. for calls made outside the fetch handle.
    pub fn record(&self, service: &str, status: Option<u16>, duration_ms: f64) {
        self.collector.record(service, status, duration_ms);
    }

    /// Current report. Drains the collector.
    pub fn reporter(&self) -> MetricsMap {
        self.collector.reporter()
    }

    pub fn collector(&self) -> &Arc<MetricsCollector> {
        &self.collector
    }
}

impl MetricsSource for FetchMetrics {
    fn name(&self) -> &str {
        Self::NAMESPACE
    }

    fn drain_snapshot(&self) -> Option<MetricsSnapshot> {
        Some(self.collector.snapshot_and_reset())
    }

    fn drain(&self) -> MetricsMap {
        self.reporter()
    }
}
