use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, trace, warn};

use crate::graphite::GraphiteClient;
use crate::metrics::{MetricsCollector, MetricsMap, MetricsSnapshot};

/// Anything the scheduler can drain on each tick.
pub trait MetricsSource: Send + Sync {
    fn name(&self) -> &str;

    /// Snapshot, reset and flatten into named metrics.
    fn drain(&self) -> MetricsMap;

    /// Snapshot and reset, keeping the raw buckets. Sources that provide it
    /// are merged bucket by bucket with other sources of the same name
    /// before flattening. Called instead of `drain`, never with it.
    fn drain_snapshot(&self) -> Option<MetricsSnapshot> {
        None
    }
}

impl MetricsSource for MetricsCollector {
    fn name(&self) -> &str {
        self.namespace()
    }

    fn drain(&self) -> MetricsMap {
        self.reporter()
    }

    fn drain_snapshot(&self) -> Option<MetricsSnapshot> {
        Some(self.snapshot_and_reset())
    }
}

// ─── Scheduler ───────────────────────────────────────────────────

/// Periodic snapshot → encode → send loop.
///
/// `start` spawns the loop on the current Tokio runtime; `stop` ends it and
/// performs one last flush. Flushes never overlap: a tick that finds the
/// previous flush still running is skipped.
pub struct Scheduler {
    interval: Duration,
    sources: Vec<Arc<dyn MetricsSource>>,
    clients: Vec<Arc<GraphiteClient>>,

    /// Set between `start` and `stop`
    running: AtomicBool,
    /// Set while a flush is in progress
    flushing: AtomicBool,
    shutdown: Notify,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(interval: Duration, sources: Vec<Arc<dyn MetricsSource>>, clients: Vec<Arc<GraphiteClient>>) -> Self {
        Self {
            interval,
            sources,
            clients,
            running: AtomicBool::new(false),
            flushing: AtomicBool::new(false),
            shutdown: Notify::new(),
            task: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the periodic loop. Returns `false` if it is already running.
    /// Must be called from within a Tokio runtime.
    pub fn start(self: &Arc<Self>) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("metrics scheduler already running");
            return false;
        }

        info!(
            interval = ?self.interval,
            sources = self.sources.len(),
            destinations = self.clients.len(),
            "metrics scheduler started"
        );

        let this = Arc::clone(self);
        *self.task.lock() = Some(tokio::spawn(this.run()));
        true
    }

    /// Stop ticking, wait for an in-flight tick, then flush what is left.
    /// Calling it again, or before `start`, does nothing.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.shutdown.notify_one();

        let task = self.task.lock().take();
        if let Some(task) = task {
            // The loop only ends by returning, so a JoinError means a panic already logged
            let _ = task.await;
        }

        self.flush().await;
        info!("metrics scheduler stopped");
    }

    /// Flush now with the current wall-clock time.
    /// Returns `false` when skipped because another flush is running.
    pub async fn flush(&self) -> bool {
        self.flush_at(Utc::now().timestamp()).await
    }

    /// Flush with a fixed timestamp shared by every line of the batch.
    pub async fn flush_at(&self, timestamp: i64) -> bool {
        let Some(_guard) = FlushGuard::acquire(&self.flushing) else {
            warn!("previous metrics flush still running, skipping this one");
            return false;
        };

        let metrics = self.drain_all();

        if metrics.is_empty() {
            trace!("nothing to flush");
            return true;
        }
        if self.clients.is_empty() {
            debug!(metrics = metrics.len(), "no destinations, dropping metrics");
            return true;
        }

        // Each client bounds its own connect and write, so a slow
        // destination cannot hold up the others.
        join_all(self.clients.iter().map(|c| c.send_metrics(&metrics, timestamp))).await;
        debug!(metrics = metrics.len(), timestamp, "metrics flushed");
        true
    }

    /// Drain every source into one map without losing samples to name clashes.
    fn drain_all(&self) -> MetricsMap {
        let mut snapshots: BTreeMap<&str, MetricsSnapshot> = BTreeMap::new();
        let mut metrics = MetricsMap::new();

        for source in &self.sources {
            match source.drain_snapshot() {
                Some(snapshot) => {
                    trace!(source = source.name(), "source drained");
                    snapshots.entry(source.name()).or_default().merge(snapshot);
                }
                None => {
                    let drained = source.drain();
                    trace!(source = source.name(), metrics = drained.len(), "source drained");
                    merge_metrics(&mut metrics, drained, source.name());
                }
            }
        }

        for (namespace, snapshot) in snapshots {
            merge_metrics(&mut metrics, snapshot.to_metrics_map(namespace), namespace);
        }
        metrics
    }

    async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks = IntervalStream::new(interval);

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => break,
                tick = ticks.next() => {
                    if tick.is_none() || !self.is_running() {
                        break;
                    }
                    self.flush().await;
                }
            }
        }
    }
}

/// Counts add up. Any other clash keeps the later value and is logged.
fn merge_metrics(into: &mut MetricsMap, drained: MetricsMap, source: &str) {
    for (name, value) in drained {
        match into.entry(name) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) if slot.key().ends_with(".count") => {
                *slot.get_mut() += value;
            }
            Entry::Occupied(mut slot) => {
                warn!(metric = %slot.key(), source, "duplicate metric from another source, keeping the latest");
                slot.insert(value);
            }
        }
    }
}

/// Clears the flushing flag when dropped.
struct FlushGuard<'a>(&'a AtomicBool);

impl<'a> FlushGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
