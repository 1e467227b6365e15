pub mod collector;
pub mod percentiles;
pub mod snapshot;

use std::collections::BTreeMap;
use std::fmt;

pub use collector::MetricsCollector;
pub use percentiles::PercentileSet;
pub use snapshot::{BucketSummary, MetricsSnapshot};

/// Flat `metric name → value` mapping handed to the line encoder.
/// Sorted so that a flush emits lines in a stable order.
pub type MetricsMap = BTreeMap<String, f64>;

/// A single timing observation produced by the interceptor.
/// The "write" side: created once per call and consumed immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    /// Logical service name from the classifier, e.g. "blogs"
    pub service: String,
    /// Response status, `None` when the call failed before a response
    pub status: Option<u16>,
    /// Wall time of the call in milliseconds
    pub duration_ms: f64,
    /// true when the call returned an error instead of a response
    pub failed: bool,
}

impl CallRecord {
    pub fn succeeded(service: impl Into<String>, status: u16, duration_ms: f64) -> Self {
        Self {
            service: service.into(),
            status: Some(status),
            duration_ms,
            failed: false,
        }
    }

    pub fn failed(service: impl Into<String>, duration_ms: f64) -> Self {
        Self {
            service: service.into(),
            status: None,
            duration_ms,
            failed: true,
        }
    }
}

/// Which slice of a service's traffic a bucket tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusClass {
    /// The exact status code, e.g. 404
    Exact(u16),
    /// The hundreds digit of the status code, rendered as "4xx"
    Family(u16),
    /// Calls that never produced a response
    Error,
}

impl StatusClass {
    /// The bucket classes a single observation contributes to.
    pub fn for_status(status: Option<u16>) -> impl Iterator<Item = StatusClass> {
        let classes = match status {
            Some(code) => [Some(Self::Exact(code)), Some(Self::Family(code / 100))],
            None => [Some(Self::Error), None],
        };
        classes.into_iter().flatten()
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(code) => write!(f, "{code}"),
            Self::Family(digit) => write!(f, "{digit}xx"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// Aggregation key: one bucket per `(service, status class)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    pub service: String,
    pub class: StatusClass,
}

impl BucketKey {
    pub fn new(service: impl Into<String>, class: StatusClass) -> Self {
        Self {
            service: service.into(),
            class,
        }
    }
}

/// Running state of one bucket. `count == samples.len()` at all times.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bucket {
    count: u64,
    samples: Vec<f64>,
}

impl Bucket {
    pub fn push(&mut self, duration_ms: f64) {
        self.count += 1;
        self.samples.push(duration_ms);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Fold another bucket's samples into this one.
    pub fn absorb(&mut self, other: Bucket) {
        self.count += other.count;
        self.samples.extend(other.samples);
    }

    pub fn summarize(&self) -> Option<PercentileSet> {
        PercentileSet::from_samples(&self.samples)
    }
}
