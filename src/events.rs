//! Structured telemetry events for configuration and transport problems.

use std::fmt;

use tracing::{error, info, warn};

pub const METRICS_DISABLED: &str = "METRICS_DISABLED";
pub const METRICS_INVALID_PRODUCTION_CONFIG: &str = "METRICS_INVALID_PRODUCTION_CONFIG";
pub const METRICS_CONNECTION_FAILED: &str = "METRICS_CONNECTION_FAILED";
pub const METRICS_WRITE_FAILED: &str = "METRICS_WRITE_FAILED";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryEvent {
    pub event: &'static str,
    pub severity: Severity,
    pub message: String,
    /// `host:port` of the destination involved, if any
    pub destination: Option<String>,
}

impl TelemetryEvent {
    pub fn new(event: &'static str, severity: Severity, message: impl fmt::Display) -> Self {
        Self {
            event,
            severity,
            message: message.to_string(),
            destination: None,
        }
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }
}

/// Where configuration and transport failures are reported.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &TelemetryEvent);
}

/// Default sink: forwards every event to `tracing` at its severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, e: &TelemetryEvent) {
        let destination = e.destination.as_deref().unwrap_or("-");
        match e.severity {
            Severity::Info => info!(event = e.event, destination, "{}", e.message),
            Severity::Warn => warn!(event = e.event, destination, "{}", e.message),
            Severity::Error => error!(event = e.event, destination, "{}", e.message),
        }
    }
}
