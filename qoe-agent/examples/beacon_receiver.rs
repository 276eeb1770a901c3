//! Minimal beacon collector for local runs.
//!
//! Run:
//!   cargo run -p qoe-agent --example beacon_receiver
//!
//! Then point the agent at it, e.g. with the CLI:
//!   qoe-cli replay script.json --endpoint http://127.0.0.1:12334/
//!
//! Optional env:
//! - BEACON_ADDR=127.0.0.1:12334
//! - BEACON_FLUSH_MS=20000   (returned as the cadence header)

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use qoe_agent::config::DEFAULT_CADENCE_HEADER;
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::{info, warn};

const BODY_LIMIT_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug)]
struct ReceiverState {
    flush_ms: Option<String>,
    batches: AtomicU64,
    events: AtomicU64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let addr: SocketAddr = std::env::var("BEACON_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:12334".to_string())
        .parse()?;

    let state = Arc::new(ReceiverState {
        flush_ms: std::env::var("BEACON_FLUSH_MS")
            .ok()
            .filter(|s| !s.trim().is_empty()),
        batches: AtomicU64::new(0),
        events: AtomicU64::new(0),
    });

    let app = Router::new()
        .route("/", post(beacon))
        .route("/healthz", get(healthz))
        .with_state(state);

    info!(%addr, "beacon receiver listening");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

async fn beacon(State(state): State<Arc<ReceiverState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let bytes = match to_bytes(body, BODY_LIMIT_BYTES).await {
        Ok(b) => b,
        Err(err) => {
            warn!(%err, "failed to read beacon body");
            return (StatusCode::BAD_REQUEST, "invalid body").into_response();
        }
    };

    let payload: Value = match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(err) => {
            warn!(%err, "beacon body is not json");
            return (StatusCode::BAD_REQUEST, "invalid json").into_response();
        }
    };

    let events = payload["events"].as_array().map(Vec::len).unwrap_or(0);
    let batch = state.batches.fetch_add(1, Ordering::Relaxed) + 1;
    let total = state.events.fetch_add(events as u64, Ordering::Relaxed) + events as u64;
    info!(
        host = ?parts.headers.get("host").and_then(|v| v.to_str().ok()),
        batch,
        events,
        total,
        rtt_ms = ?payload["metadata"]["rtt_ms"].as_i64(),
        "received beacon batch"
    );
    for event in payload["events"].as_array().into_iter().flatten() {
        info!(
            evna = event["evna"].as_str().unwrap_or("?"),
            veid = event["veid"].as_str().unwrap_or("-"),
            vesqnu = ?event["vesqnu"].as_i64(),
            fields = event.as_object().map(|o| o.len()).unwrap_or(0),
            "event"
        );
    }

    let mut response = StatusCode::OK.into_response();
    if let Some(flush_ms) = state
        .flush_ms
        .as_deref()
        .and_then(|value| HeaderValue::from_str(value).ok())
    {
        response
            .headers_mut()
            .insert(DEFAULT_CADENCE_HEADER, flush_ms);
    }
    response
}
