//! Outbound call telemetry.
//!
//! Intercepts calls made through a [`FetchHandle`], classifies them into
//! services, aggregates per-status latency distributions in memory and
//! periodically ships them to Graphite-compatible collectors.
//!
//! ```no_run
//! use std::sync::Arc;
//! use fetch_telemetry::{
//!     Classifier, FetchHandle, FetchMetrics, HttpFetcher, InstrumentOptions, MetricsSource,
//!     Scheduler, TelemetryConfig, TracingSink,
//! };
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TelemetryConfig::load("telemetry.toml")?;
//! let handle = Arc::new(FetchHandle::new(Arc::new(HttpFetcher::default())));
//!
//! let fetch = Arc::new(FetchMetrics::new(handle.clone(), Classifier::new(config.service_rules()?)));
//! fetch.instrument(InstrumentOptions::default())?;
//!
//! let sources: Vec<Arc<dyn MetricsSource>> = vec![fetch.clone()];
//! let scheduler = Arc::new(Scheduler::new(config.interval(), sources, config.clients(Arc::new(TracingSink))));
//! scheduler.start();
//!
//! handle.fetch("https://blogs.ft.com", &Default::default()).await?;
//!
//! scheduler.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod config;
pub mod error;
pub mod events;
pub mod fetch;
pub mod graphite;
pub mod metrics;
pub mod middleware;
pub mod scheduler;
pub mod telemetry;

pub use classifier::{Classifier, ExactMatcher, Matcher, PrefixMatcher, ServiceRule};
pub use config::{Destination, ServiceRuleConfig, TelemetryConfig};
pub use error::{ConfigurationError, InstrumentationError, TransportError};
pub use events::{EventSink, Severity, TelemetryEvent, TracingSink};
pub use fetch::{FetchError, FetchHandle, FetchOptions, FetchResponse, Fetcher, HttpFetcher};
pub use graphite::{ClientOptions, GraphiteClient};
pub use metrics::{CallRecord, MetricsCollector, MetricsMap, MetricsSnapshot, PercentileSet, StatusClass};
pub use middleware::{FetchInterceptor, InstrumentOptions};
pub use scheduler::{MetricsSource, Scheduler};
pub use telemetry::FetchMetrics;
