//! # Converge Ledger — transport adaptor
//!
//! A thin HTTP/SSE surface over `ledger-core`'s `Store`. Translates the
//! five RPC-style calls SPEC §4.8/§6 describes (`Append`, `Get`,
//! `Snapshot`, `Load`, `Watch`) into `Store`/`WatchRegistry` invocations and
//! maps `LedgerError` to HTTP status codes at the boundary. No business
//! logic lives in this crate: cluster membership, peer discovery, and
//! process supervision are out of scope (spec.md §1).
//!
//! Routes:
//! - GET  /health
//! - GET  /metrics
//! - POST /v1/contexts/:context_id/append
//! - GET  /v1/contexts/:context_id/entries
//! - POST /v1/contexts/:context_id/snapshot
//! - POST /v1/contexts/:context_id/load
//! - GET  /v1/contexts/:context_id/watch (SSE)

use std::sync::Arc;
use std::time::Duration;

use ledger_core::Store;
use ledger_server::{config, routes};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ledger_server=info".parse().unwrap())
                .add_directive("ledger_core=info".parse().unwrap()),
        )
        .init();

    let max_payload_bytes = config::max_payload_bytes();
    let data_dir = config::data_dir();
    let port = config::listen_port();

    info!(max_payload_bytes, data_dir = %data_dir, "converge ledger starting");
    info!("data_dir is read for forward compatibility with a future durable table backend; the in-memory store does not persist across restarts");

    let store = Arc::new(Store::with_limits(max_payload_bytes, Duration::from_secs(5)));
    let state = routes::AppState::new(store);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = format!("0.0.0.0:{port}");
    info!("listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
