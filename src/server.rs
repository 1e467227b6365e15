use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::Path,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use rand::Rng;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

/// Mock upstream the load generator calls through the instrumented handle.
pub fn create_router() -> Router {
    Router::new()
        // ── Always healthy ──────────────────────────────────────
        .route("/blogs/:id", get(blog_post))
        // ── Mixed outcomes ──────────────────────────────────────
        .route("/capi/:id", get(content))
        // ── Latency on demand ───────────────────────────────────
        .route("/slow/:ms", get(slow))
        .layer(TraceLayer::new_for_http())
}

/// Bind on an ephemeral localhost port and serve in the background.
pub async fn spawn() -> std::io::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, create_router()).await {
            tracing::error!(error = %e, "mock upstream exited");
        }
    });

    Ok(addr)
}

// ─── GET /blogs/:id ──────────────────────────────────────────────

async fn blog_post(Path(id): Path<u32>) -> Json<Value> {
    Json(json!({
        "id": id,
        "title": format!("Post #{id}"),
    }))
}

// ─── GET /capi/:id ───────────────────────────────────────────────
/// 80 % OK, 10 % not found, 10 % server error.

async fn content(Path(id): Path<u32>) -> (StatusCode, Json<Value>) {
    let roll = rand::thread_rng().gen_range(0u8..100);
    let status = match roll {
        0..=79 => StatusCode::OK,
        80..=89 => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "id": id })))
}

// ─── GET /slow/:ms ───────────────────────────────────────────────

async fn slow(Path(ms): Path<u64>) -> StatusCode {
    tokio::time::sleep(Duration::from_millis(ms.min(10_000))).await;
    StatusCode::OK
}
