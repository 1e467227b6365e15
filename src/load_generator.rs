use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fetch_telemetry::{FetchHandle, FetchOptions};

// ─── Public entry point ──────────────────────────────────────────

/// Spawns `concurrency` Tokio tasks that call the mock upstream through
/// `handle` until the deadline or the `running` flag is set to false.
pub async fn run(
    running: Arc<AtomicBool>,
    handle: Arc<FetchHandle>,
    base_url: String,
    concurrency: u32,
    duration_secs: u64,
) {
    let deadline = Instant::now() + Duration::from_secs(duration_secs);
    let base_url: Arc<str> = base_url.into();

    let mut handles = Vec::with_capacity(concurrency as usize);

    for worker_id in 0..concurrency {
        let running = running.clone();
        let handle = handle.clone();
        let base_url = base_url.clone();

        handles.push(tokio::spawn(async move {
            worker(worker_id, running, handle, base_url, deadline).await;
        }));
    }

    for h in handles {
        let _ = h.await;
    }

    running.store(false, Ordering::SeqCst);
}

// ─── Worker loop ─────────────────────────────────────────────────

async fn worker(
    id: u32,
    running: Arc<AtomicBool>,
    handle: Arc<FetchHandle>,
    base_url: Arc<str>,
    deadline: Instant,
) {
    // Each worker gets its own deterministic RNG seeded uniquely.
    let mut rng = StdRng::seed_from_u64(1000 + id as u64);

    while running.load(Ordering::Relaxed) && Instant::now() < deadline {
        let (target, options) = next_call(&mut rng, &base_url);

        if let Err(e) = handle.fetch(&target, &options).await {
            tracing::debug!(worker = id, url = %target, error = %e, "call failed");
        }

        tokio::time::sleep(Duration::from_millis(rng.gen_range(5..50))).await;
    }
}

/// 50 % blogs, 30 % capi, 10 % slow, 10 % a route no rule knows about.
fn next_call(rng: &mut StdRng, base_url: &str) -> (String, FetchOptions) {
    let roll = rng.gen_range(0u8..100);
    match roll {
        0..=49 => (
            format!("{base_url}/blogs/{}", rng.gen_range(1..=500u32)),
            FetchOptions::default(),
        ),
        50..=79 => (
            format!("{base_url}/capi/{}", rng.gen_range(1..=10_000u32)),
            FetchOptions::default(),
        ),
        80..=89 => (
            format!("{base_url}/slow/{}", rng.gen_range(50..=400u32)),
            FetchOptions::default(),
        ),
        _ => (
            format!("{base_url}/unknown/{}", rng.gen::<u16>()),
            FetchOptions::method("HEAD"),
        ),
    }
}
