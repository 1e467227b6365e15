use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, trace};

use super::encoder;
use crate::config::Destination;
use crate::error::TransportError;
use crate::events::{self, EventSink, Severity, TelemetryEvent, TracingSink};
use crate::metrics::MetricsMap;

/// Default bound on connect and on each write.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    /// Log every payload at info level before it is written.
    pub log_payloads: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_TIMEOUT,
            write_timeout: DEFAULT_TIMEOUT,
            log_payloads: false,
        }
    }
}

/// Fire-and-forget plaintext client for one destination.
///
/// Keeps a single TCP connection open between flushes and reconnects lazily
/// when it is missing or was closed by the peer. Failures are reported to the
/// event sink and the payload is dropped; `send` itself never fails.
pub struct GraphiteClient {
    destination: Option<Destination>,
    key_prefix: String,
    options: ClientOptions,
    sink: Arc<dyn EventSink>,
    conn: Mutex<Option<TcpStream>>,
}

impl GraphiteClient {
    pub fn new(destination: Destination, options: ClientOptions, sink: Arc<dyn EventSink>) -> Self {
        // Hosted collectors identify the account by a key in front of every metric.
        let key_prefix = format!(
            "{}{}",
            destination.api_key.as_deref().unwrap_or_default(),
            destination.key_prefix
        );
        Self {
            destination: Some(destination),
            key_prefix,
            options,
            sink,
            conn: Mutex::new(None),
        }
    }

    /// A client with no destination: `send` does nothing.
    pub fn disabled() -> Self {
        Self {
            destination: None,
            key_prefix: String::new(),
            options: ClientOptions::default(),
            sink: Arc::new(TracingSink),
            conn: Mutex::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.destination.is_some()
    }

    pub fn destination(&self) -> Option<&Destination> {
        self.destination.as_ref()
    }

    /// Prefix placed in front of every metric name for this destination.
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Encode with this destination's prefix and send.
    pub async fn send_metrics(&self, metrics: &MetricsMap, timestamp: i64) {
        if !self.is_enabled() {
            return;
        }
        let payload = encoder::encode_payload(metrics, timestamp, &self.key_prefix);
        self.send(&payload).await;
    }

    pub async fn send(&self, payload: &str) {
        let Some(destination) = &self.destination else {
            return;
        };
        if payload.is_empty() {
            return;
        }

        let addr = destination.addr();
        if self.options.log_payloads {
            info!(destination = %addr, "sending metrics\n{payload}");
        }

        if let Err(e) = self.try_send(&addr, payload).await {
            let code = match e {
                TransportError::Connect { .. } => events::METRICS_CONNECTION_FAILED,
                TransportError::Timeout { op: "connect", .. } => events::METRICS_CONNECTION_FAILED,
                _ => events::METRICS_WRITE_FAILED,
            };
            self.sink
                .emit(&TelemetryEvent::new(code, Severity::Error, &e).with_destination(addr));
        }
    }

    async fn try_send(&self, addr: &str, payload: &str) -> Result<(), TransportError> {
        let mut conn = self.conn.lock().await;

        if conn.as_ref().is_some_and(|stream| !is_open(stream)) {
            debug!(destination = %addr, "collector closed the connection");
            *conn = None;
        }

        let mut stream = match conn.take() {
            Some(stream) => stream,
            None => self.connect(addr).await?,
        };

        // On failure the stream is dropped here: a partial write leaves it unusable.
        let write = tokio::time::timeout(self.options.write_timeout, stream.write_all(payload.as_bytes())).await;
        match write {
            Ok(Ok(())) => {
                trace!(destination = %addr, bytes = payload.len(), "metrics written");
                *conn = Some(stream);
                Ok(())
            }
            Ok(Err(source)) => Err(TransportError::Write {
                addr: addr.to_owned(),
                source,
            }),
            Err(_) => Err(TransportError::Timeout {
                addr: addr.to_owned(),
                op: "write",
                after: self.options.write_timeout,
            }),
        }
    }

    async fn connect(&self, addr: &str) -> Result<TcpStream, TransportError> {
        let timeout = self.options.connect_timeout;
        match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(destination = %addr, error = %e, "could not disable Nagle on collector socket");
                }
                debug!(destination = %addr, "connected to collector");
                Ok(stream)
            }
            Ok(Err(source)) => Err(TransportError::Connect {
                addr: addr.to_owned(),
                source,
            }),
            Err(_) => Err(TransportError::Timeout {
                addr: addr.to_owned(),
                op: "connect",
                after: timeout,
            }),
        }
    }
}

/// The collector never writes back, so a readable socket means EOF or reset.
fn is_open(stream: &TcpStream) -> bool {
    let mut scratch = [0u8; 64];
    match stream.try_read(&mut scratch) {
        Ok(0) => false,
        Ok(_) => true,
        Err(e) if e.kind() == ErrorKind::WouldBlock => true,
        Err(_) => false,
    }
}
