//! The outbound-call primitive the interceptor wraps.
//!
//! Applications make calls through a shared [`FetchHandle`]. The handle holds
//! the current [`Fetcher`], which the interceptor swaps for an instrumented
//! wrapper and later swaps back.

pub mod http;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;

pub use http::HttpFetcher;

/// Per-call options passed alongside the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub timeout: Option<Duration>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            method: "GET".into(),
            headers: BTreeMap::new(),
            body: None,
            timeout: None,
        }
    }
}

impl FetchOptions {
    pub fn method(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no fetcher installed")]
    Unavailable,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, target: &str, options: &FetchOptions) -> Result<FetchResponse, FetchError>;

    /// True for wrappers that already record metrics.
    fn is_instrumented(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for dyn Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("instrumented", &self.is_instrumented())
            .finish_non_exhaustive()
    }
}

/// Swappable slot holding the application's current fetcher.
#[derive(Default)]
pub struct FetchHandle {
    slot: RwLock<Option<Arc<dyn Fetcher>>>,
}

impl FetchHandle {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            slot: RwLock::new(Some(fetcher)),
        }
    }

    /// A handle with nothing installed; instrumenting it fails.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<dyn Fetcher>> {
        self.slot.read().clone()
    }

    pub fn install(&self, fetcher: Arc<dyn Fetcher>) -> Option<Arc<dyn Fetcher>> {
        self.slot.write().replace(fetcher)
    }

    /// Run `f` with exclusive access to the slot so a read-then-swap cannot
    /// interleave with another writer.
    pub(crate) fn with_slot<R>(&self, f: impl FnOnce(&mut Option<Arc<dyn Fetcher>>) -> R) -> R {
        f(&mut self.slot.write())
    }

    /// Call whatever fetcher is currently installed.
    /// The lock is released before the call is awaited.
    pub async fn fetch(&self, target: &str, options: &FetchOptions) -> Result<FetchResponse, FetchError> {
        let fetcher = self.current().ok_or(FetchError::Unavailable)?;
        fetcher.fetch(target, options).await
    }
}
