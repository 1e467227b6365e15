use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, error, info, Level};
use tracing_subscriber::prelude::*;

use fetch_telemetry::{
    Classifier, Destination, EventSink, FetchHandle, FetchMetrics, HttpFetcher, InstrumentOptions,
    MetricsSource, PrefixMatcher, Scheduler, TelemetryConfig, TracingSink,
};

mod collector_sink;
mod load_generator;
mod server;

/// Generates outbound traffic against a mock upstream and ships the
/// resulting call metrics to the configured collectors.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// TOML telemetry config; telemetry stays local without one
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of concurrent callers
    #[arg(long, default_value_t = 8)]
    concurrency: u32,

    /// How long the load runs (seconds)
    #[arg(long, default_value_t = 30)]
    duration_secs: u64,

    /// Override the flush interval (seconds)
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Start a local collector on this port (0 = any) and send metrics to it
    #[arg(long)]
    sink_port: Option<u16>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    info!("fetch-telemetry {} starting", env!("CARGO_PKG_VERSION"));

    // ── 1. Configuration ─────────────────────────────────────────
    let mut config = match &args.config {
        Some(path) => TelemetryConfig::load(path).unwrap_or_else(|e| {
            error!(path = %path.display(), error = %e, "unusable telemetry config, metrics disabled");
            TelemetryConfig {
                enabled: false,
                ..TelemetryConfig::default()
            }
        }),
        None => TelemetryConfig::default(),
    };
    if let Some(secs) = args.interval_secs {
        config.interval_secs = secs;
    }

    // ── 2. Optional local collector ──────────────────────────────
    if let Some(port) = args.sink_port {
        let addr = collector_sink::spawn(port)
            .await
            .expect("Failed to bind local collector");
        info!(%addr, "local collector listening");
        config.production = true;
        config
            .destinations
            .push(Destination::new("127.0.0.1", addr.port(), ".demo.").with_api_key("local"));
    }

    // ── 3. Mock upstream ─────────────────────────────────────────
    let upstream = server::spawn().await.expect("Failed to bind mock upstream");
    let base_url = format!("http://{upstream}");
    info!(%base_url, "mock upstream listening");

    // ── 4. Classifier: configured rules first, then the demo routes ──
    let rules = config.service_rules().unwrap_or_else(|e| {
        error!(error = %e, "ignoring configured service rules");
        Vec::new()
    });
    let classifier = Classifier::new(rules)
        .rule("blogs", PrefixMatcher(format!("{base_url}/blogs/")))
        .rule("capi", PrefixMatcher(format!("{base_url}/capi/")))
        .rule("slow", PrefixMatcher(format!("{base_url}/slow/")));

    // ── 5. Instrument the outbound handle ────────────────────────
    let handle = Arc::new(FetchHandle::new(Arc::new(HttpFetcher::default())));
    let fetch = Arc::new(FetchMetrics::new(handle.clone(), classifier));
    fetch
        .instrument(
            InstrumentOptions::default()
                .on_unclassified(|target, options| {
                    debug!(url = target, method = %options.method, "unclassified call");
                })
                .settle_timeout(Duration::from_secs(2)),
        )
        .expect("Handle was created with a fetcher");

    // ── 6. Scheduler ─────────────────────────────────────────────
    let sink: Arc<dyn EventSink> = Arc::new(TracingSink);
    let sources: Vec<Arc<dyn MetricsSource>> = vec![fetch.clone()];
    let scheduler = Arc::new(Scheduler::new(config.interval(), sources, config.clients(sink)));
    scheduler.start();

    // ── 7. Load until done or Ctrl-C ─────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let load = tokio::spawn(load_generator::run(
        running.clone(),
        handle.clone(),
        base_url,
        args.concurrency,
        args.duration_secs,
    ));
    tokio::pin!(load);

    tokio::select! {
        _ = &mut load => {}
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, stopping load");
            running.store(false, Ordering::SeqCst);
            let _ = load.await;
        }
    }

    // ── 8. Final flush and teardown ──────────────────────────────
    scheduler.stop().await;
    if let Err(e) = fetch.restore() {
        error!(error = %e, "restore failed");
    }
    info!("done");
}
