//! Telemetry configuration.
//!
//! Values arrive already resolved (a TOML file in the demo binary); nothing
//! here reads environment variables.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::ServiceRule;
use crate::error::ConfigurationError;
use crate::events::{self, EventSink, Severity, TelemetryEvent};
use crate::graphite::{ClientOptions, GraphiteClient};

// ─── Destination ─────────────────────────────────────────────────

/// One collector endpoint with its own metric prefix and credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub key_prefix: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Destination {
    pub fn new(host: impl Into<String>, port: u16, key_prefix: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            key_prefix: key_prefix.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn validate(&self, require_api_key: bool) -> Result<(), ConfigurationError> {
        if self.host.trim().is_empty() {
            return Err(ConfigurationError::MissingHost);
        }
        if self.port == 0 {
            return Err(ConfigurationError::InvalidPort {
                host: self.host.clone(),
            });
        }
        let has_key = self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty());
        if require_api_key && !has_key {
            return Err(ConfigurationError::MissingApiKey {
                host: self.host.clone(),
                port: self.port,
            });
        }
        Ok(())
    }
}

// ─── Service rules ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRuleConfig {
    pub name: String,
    /// Regular expression matched against the call target
    pub pattern: String,
}

// ─── TelemetryConfig ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Master switch; off means no destinations at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Only production ships metrics, and it requires an api key per destination
    #[serde(default)]
    pub production: bool,

    /// Seconds between flushes
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Log every payload sent to a destination
    #[serde(default)]
    pub log_metrics: bool,

    #[serde(default)]
    pub destinations: Vec<Destination>,

    /// Evaluated in order, first match wins
    #[serde(default)]
    pub services: Vec<ServiceRuleConfig>,
}

fn default_enabled() -> bool {
    true
}
fn default_interval_secs() -> u64 {
    60
}
fn default_timeout_ms() -> u64 {
    5_000
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            production: false,
            interval_secs: default_interval_secs(),
            connect_timeout_ms: default_timeout_ms(),
            write_timeout_ms: default_timeout_ms(),
            log_metrics: false,
            destinations: Vec::new(),
            services: Vec::new(),
        }
    }
}

impl TelemetryConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigurationError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Flush interval, never shorter than one second.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            log_payloads: self.log_metrics,
        }
    }

    /// The destinations metrics should actually be sent to.
    ///
    /// Disabled or non-production configs yield none. In production each
    /// destination stands alone: an invalid one is reported to `sink` and
    /// dropped while the valid ones are kept.
    pub fn resolve_destinations(&self, sink: &dyn EventSink) -> Vec<Destination> {
        if !self.enabled {
            sink.emit(&TelemetryEvent::new(
                events::METRICS_DISABLED,
                Severity::Info,
                "metrics explicitly disabled",
            ));
            return Vec::new();
        }

        if !self.production {
            debug!(
                configured = self.destinations.len(),
                "not running in production, metrics will not be sent"
            );
            return Vec::new();
        }

        if self.destinations.is_empty() {
            report_invalid(sink, &ConfigurationError::MissingHost, None);
            return Vec::new();
        }

        self.destinations
            .iter()
            .filter(|destination| match destination.validate(true) {
                Ok(()) => true,
                Err(e) => {
                    report_invalid(sink, &e, Some(destination.addr()));
                    false
                }
            })
            .cloned()
            .collect()
    }

    /// One client per resolved destination.
    pub fn clients(&self, sink: Arc<dyn EventSink>) -> Vec<Arc<GraphiteClient>> {
        self.resolve_destinations(sink.as_ref())
            .into_iter()
            .map(|d| Arc::new(GraphiteClient::new(d, self.client_options(), sink.clone())))
            .collect()
    }

    /// Compile the configured service patterns, preserving order.
    pub fn service_rules(&self) -> Result<Vec<ServiceRule>, ConfigurationError> {
        self.services
            .iter()
            .map(|s| {
                let regex = Regex::new(&s.pattern).map_err(|source| ConfigurationError::InvalidPattern {
                    service: s.name.clone(),
                    source,
                })?;
                Ok(ServiceRule::new(s.name.clone(), regex))
            })
            .collect()
    }
}

fn report_invalid(sink: &dyn EventSink, error: &ConfigurationError, destination: Option<String>) {
    let event = TelemetryEvent::new(
        events::METRICS_INVALID_PRODUCTION_CONFIG,
        Severity::Error,
        format!("invalid production metrics config: {error}"),
    );
    sink.emit(&match destination {
        Some(addr) => event.with_destination(addr),
        None => event,
    });
}
