use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::classifier::Classifier;
use crate::error::InstrumentationError;
use crate::fetch::{FetchError, FetchHandle, FetchOptions, FetchResponse, Fetcher};
use crate::metrics::{CallRecord, MetricsCollector};

/// Called with the original arguments for every call no rule matched.
pub type UnclassifiedHook = Arc<dyn Fn(&str, &FetchOptions) + Send + Sync>;

#[derive(Clone, Default)]
pub struct InstrumentOptions {
    /// Defaults to a no-op.
    pub on_unclassified: Option<UnclassifiedHook>,
    /// Calls still running after this long are recorded as errors.
    /// The call itself is left alone.
    pub settle_timeout: Option<Duration>,
}

impl InstrumentOptions {
    pub fn on_unclassified(mut self, hook: impl Fn(&str, &FetchOptions) + Send + Sync + 'static) -> Self {
        self.on_unclassified = Some(Arc::new(hook));
        self
    }

    pub fn settle_timeout(mut self, timeout: Duration) -> Self {
        self.settle_timeout = Some(timeout);
        self
    }
}

impl fmt::Debug for InstrumentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentOptions")
            .field("on_unclassified", &self.on_unclassified.is_some())
            .field("settle_timeout", &self.settle_timeout)
            .finish()
    }
}

// ─── Interceptor ─────────────────────────────────────────────────

/// Owns the swap of a [`FetchHandle`]'s fetcher for a timing wrapper.
pub struct FetchInterceptor {
    handle: Arc<FetchHandle>,
    classifier: Arc<Classifier>,
    collector: Arc<MetricsCollector>,
    /// The fetcher that was installed before `instrument`, while instrumented.
    original: Mutex<Option<Arc<dyn Fetcher>>>,
}

impl FetchInterceptor {
    pub fn new(handle: Arc<FetchHandle>, classifier: Arc<Classifier>, collector: Arc<MetricsCollector>) -> Self {
        Self {
            handle,
            classifier,
            collector,
            original: Mutex::new(None),
        }
    }

    pub fn is_instrumented(&self) -> bool {
        self.original.lock().is_some()
    }

    /// Wrap the handle's current fetcher. A second call, or a handle that
    /// already holds an instrumented fetcher, is a no-op.
    pub fn instrument(&self, options: InstrumentOptions) -> Result<(), InstrumentationError> {
        let mut original = self.original.lock();
        if original.is_some() {
            debug!("fetch already instrumented by this interceptor");
            return Ok(());
        }

        self.handle.with_slot(|slot| -> Result<(), InstrumentationError> {
            let current = slot.as_ref().ok_or(InstrumentationError::Unavailable)?;
            if current.is_instrumented() {
                debug!("fetch already instrumented elsewhere, leaving it in place");
                return Ok(());
            }

            let wrapper = InstrumentedFetch {
                inner: current.clone(),
                classifier: self.classifier.clone(),
                collector: self.collector.clone(),
                on_unclassified: options.on_unclassified,
                settle_timeout: options.settle_timeout,
            };
            *original = slot.replace(Arc::new(wrapper));
            debug!(rules = self.classifier.len(), "fetch instrumented");
            Ok(())
        })
    }

    /// Put the original fetcher back and return it.
    pub fn restore(&self) -> Result<Arc<dyn Fetcher>, InstrumentationError> {
        let original = self
            .original
            .lock()
            .take()
            .ok_or(InstrumentationError::NotInstrumented)?;
        self.handle.install(original.clone());
        debug!("fetch restored");
        Ok(original)
    }
}

// ─── Wrapper ─────────────────────────────────────────────────────

/// Same signature as the wrapped fetcher; times and records every
/// classified call and passes its outcome through untouched.
struct InstrumentedFetch {
    inner: Arc<dyn Fetcher>,
    classifier: Arc<Classifier>,
    collector: Arc<MetricsCollector>,
    on_unclassified: Option<UnclassifiedHook>,
    settle_timeout: Option<Duration>,
}

#[async_trait]
impl Fetcher for InstrumentedFetch {
    async fn fetch(&self, target: &str, options: &FetchOptions) -> Result<FetchResponse, FetchError> {
        let Some(service) = self.classifier.classify(target) else {
            if let Some(hook) = &self.on_unclassified {
                hook(target, options);
            }
            return self.inner.fetch(target, options).await;
        };

        let start = Instant::now();
        let call = self.inner.fetch(target, options);
        tokio::pin!(call);

        let outcome = match self.settle_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    debug!(service, url = target, ?limit, "call did not settle in time, recording as error");
                    self.collector.observe(&CallRecord::failed(service, millis(start.elapsed())));
                    return call.await;
                }
            },
            None => call.await,
        };

        let elapsed = millis(start.elapsed());
        let record = match &outcome {
            Ok(response) => CallRecord::succeeded(service, response.status, elapsed),
            Err(_) => CallRecord::failed(service, elapsed),
        };
        trace!(service, status = ?record.status, elapsed_ms = elapsed, "fetch observed");
        self.collector.observe(&record);

        outcome
    }

    fn is_instrumented(&self) -> bool {
        true
    }
}

fn millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}
