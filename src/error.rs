use std::io;
use std::time::Duration;

use thiserror::Error;

// ─── Instrumentation ─────────────────────────────────────────────

/// Raised synchronously by `instrument` / `restore`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InstrumentationError {
    #[error("no fetcher is installed in the handle, nothing to instrument")]
    Unavailable,

    #[error("fetch is not instrumented, nothing to restore")]
    NotInstrumented,
}

// ─── Configuration ───────────────────────────────────────────────

/// Invalid destination or rule configuration. Logged, never fatal.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("destination {host}:{port} has no api key")]
    MissingApiKey { host: String, port: u16 },

    #[error("destination has an empty host")]
    MissingHost,

    #[error("destination {host} has port 0")]
    InvalidPort { host: String },

    #[error("service '{service}' has an invalid pattern: {source}")]
    InvalidPattern {
        service: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to read config file: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

// ─── Transport ───────────────────────────────────────────────────

/// Connection or write failure towards one destination.
/// Caught inside the client; callers never see it.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("write to {addr} failed: {source}")]
    Write {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("{op} to {addr} timed out after {after:?}")]
    Timeout {
        addr: String,
        op: &'static str,
        after: Duration,
    },
}
