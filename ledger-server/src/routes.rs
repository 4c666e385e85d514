//! The five-call transport surface: `Append`, `Get`,
//! `Snapshot`, `Load`, `Watch`. Every handler is a thin translation into a
//! `Store`/`WatchRegistry` call — no business logic lives here, matching
//! spec.md §1's "thin adaptors" framing.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use ledger_core::{Entry, GetOptions, LoadOptions, SnapshotBlob, Store};

use crate::error::ApiError;
use crate::metrics::{LEDGER_APPENDS, LEDGER_OPS, LEDGER_WATCH_EVENTS};

/// Shared application state: one `Store` for the whole process, plus a
/// monotonic counter minting a fresh `SubscriberId` per `Watch` connection.
#[derive(Clone)]
pub struct AppState {
    store: Arc<Store>,
    next_subscriber: Arc<AtomicU64>,
}

impl AppState {
    /// Wraps an existing store for the router to share across handlers.
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            next_subscriber: Arc::new(AtomicU64::new(1)),
        }
    }
}

/// The adaptor's full route table.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(crate::metrics::metrics_handler))
        .route("/v1/contexts/:context_id/append", post(append))
        .route("/v1/contexts/:context_id/entries", get(get_entries))
        .route("/v1/contexts/:context_id/snapshot", post(snapshot))
        .route("/v1/contexts/:context_id/load", post(load))
        .route("/v1/contexts/:context_id/watch", get(watch))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

// ----------------------------------------------------------------------
// Wire DTOs. Payloads and blobs cross the wire base64-encoded, following
// `ubl-server`'s `base64::engine::general_purpose::*` + `Engine` usage in
// `crypto.rs`/`id_routes.rs`/`keystore.rs` rather than raw JSON byte arrays.
// ----------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EntryDto {
    id: String,
    context_id: String,
    key: String,
    payload_base64: String,
    sequence: u64,
    appended_at_ns: i128,
    metadata: BTreeMap<String, String>,
    lamport_clock: Option<u64>,
    content_hash: Option<String>,
}

impl From<&Entry> for EntryDto {
    fn from(e: &Entry) -> Self {
        Self {
            id: e.id.clone(),
            context_id: e.context_id.clone(),
            key: e.key.clone(),
            payload_base64: BASE64.encode(&e.payload),
            sequence: e.sequence,
            appended_at_ns: e.appended_at_ns,
            metadata: e.metadata.clone(),
            lamport_clock: e.lamport_clock,
            content_hash: e.content_hash.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AppendRequest {
    key: String,
    payload_base64: String,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
    /// When set, appends via `append_with_received_time` instead of a plain tick.
    #[serde(default)]
    received_lamport_time: Option<u64>,
}

/// POST /v1/contexts/:context_id/append
async fn append(
    State(state): State<AppState>,
    Path(context_id): Path<String>,
    Json(req): Json<AppendRequest>,
) -> Result<Json<EntryDto>, ApiError> {
    let payload = BASE64
        .decode(req.payload_base64.as_bytes())
        .map_err(|e| ApiError::from(ledger_core::LedgerError::InvalidSnapshotFormat(format!(
            "payload_base64 is not valid base64: {e}"
        ))))?;

    let result = match req.received_lamport_time {
        Some(received) => {
            state
                .store
                .append_with_received_time(&context_id, &req.key, payload, received, req.metadata)
                .await
        }
        None => state.store.append(&context_id, &req.key, payload, req.metadata).await,
    };

    match result {
        Ok(entry) => {
            LEDGER_OPS.with_label_values(&["append", "ok"]).inc();
            LEDGER_APPENDS.with_label_values(&[&context_id]).inc();
            Ok(Json(EntryDto::from(&entry)))
        }
        Err(e) => {
            LEDGER_OPS.with_label_values(&["append", "error"]).inc();
            Err(e.into())
        }
    }
}

#[derive(Debug, Deserialize)]
struct GetQuery {
    key: Option<String>,
    after_sequence: Option<u64>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct GetResponse {
    entries: Vec<EntryDto>,
    latest_sequence: u64,
}

/// GET /v1/contexts/:context_id/entries
async fn get_entries(
    State(state): State<AppState>,
    Path(context_id): Path<String>,
    Query(q): Query<GetQuery>,
) -> Result<Json<GetResponse>, ApiError> {
    let mut options = GetOptions::all();
    if let Some(key) = q.key {
        options = options.with_key(key);
    }
    if let Some(after) = q.after_sequence {
        options = options.after(after);
    }
    if let Some(limit) = q.limit {
        options = options.limit(limit);
    }

    match state.store.get(&context_id, &options).await {
        Ok((entries, latest_sequence)) => {
            LEDGER_OPS.with_label_values(&["get", "ok"]).inc();
            Ok(Json(GetResponse {
                entries: entries.iter().map(EntryDto::from).collect(),
                latest_sequence,
            }))
        }
        Err(e) => {
            LEDGER_OPS.with_label_values(&["get", "error"]).inc();
            Err(e.into())
        }
    }
}

#[derive(Debug, Serialize)]
struct SnapshotResponse {
    blob_base64: String,
    sequence: u64,
    created_at_ns: i128,
    entry_count: usize,
    version: u32,
    merkle_root: String,
}

/// POST /v1/contexts/:context_id/snapshot
async fn snapshot(
    State(state): State<AppState>,
    Path(context_id): Path<String>,
) -> Result<Json<SnapshotResponse>, ApiError> {
    match state.store.snapshot(&context_id).await {
        Ok((blob, sequence, meta)) => {
            LEDGER_OPS.with_label_values(&["snapshot", "ok"]).inc();
            info!(context_id = %context_id, sequence, entry_count = meta.entry_count, "snapshot taken");
            Ok(Json(SnapshotResponse {
                blob_base64: BASE64.encode(&blob.0),
                sequence,
                created_at_ns: meta.created_at_ns,
                entry_count: meta.entry_count,
                version: meta.version,
                merkle_root: meta.merkle_root,
            }))
        }
        Err(e) => {
            LEDGER_OPS.with_label_values(&["snapshot", "error"]).inc();
            Err(e.into())
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoadRequest {
    blob_base64: String,
    #[serde(default)]
    fail_if_exists: bool,
    #[serde(default = "default_true")]
    verify_integrity: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
struct LoadResponse {
    entries_restored: usize,
    latest_sequence: u64,
}

/// POST /v1/contexts/:context_id/load
async fn load(
    State(state): State<AppState>,
    Path(context_id): Path<String>,
    Json(req): Json<LoadRequest>,
) -> Result<Json<LoadResponse>, ApiError> {
    let bytes = BASE64
        .decode(req.blob_base64.as_bytes())
        .map_err(|e| ApiError::from(ledger_core::LedgerError::InvalidSnapshotFormat(format!(
            "blob_base64 is not valid base64: {e}"
        ))))?;
    let blob = SnapshotBlob(bytes);

    let options = LoadOptions {
        fail_if_exists: req.fail_if_exists,
        verify_integrity: req.verify_integrity,
    };

    match state.store.load(&context_id, &blob, options).await {
        Ok((entries_restored, latest_sequence)) => {
            LEDGER_OPS.with_label_values(&["load", "ok"]).inc();
            warn!(context_id = %context_id, entries_restored, latest_sequence, "context loaded");
            Ok(Json(LoadResponse {
                entries_restored,
                latest_sequence,
            }))
        }
        Err(e) => {
            LEDGER_OPS.with_label_values(&["load", "error"]).inc();
            Err(e.into())
        }
    }
}

#[derive(Debug, Deserialize)]
struct WatchQuery {
    key: Option<String>,
    #[serde(default)]
    from_sequence: u64,
}

/// GET /v1/contexts/:context_id/watch
///
/// Implements spec.md §4.8's prescribed strategy verbatim: subscribe first,
/// buffer live notifications while the catch-up read runs, stream the
/// catch-up entries, then drain the buffer skipping anything already
/// delivered by sequence, then switch to direct forwarding. This guarantees
/// every entry with `sequence > from_sequence` is delivered exactly once.
async fn watch(
    State(state): State<AppState>,
    Path(context_id): Path<String>,
    Query(q): Query<WatchQuery>,
) -> impl IntoResponse {
    let subscriber_id = state.next_subscriber.fetch_add(1, Ordering::Relaxed);
    let (_subscription_ref, mut live_rx) =
        state.store.watch().subscribe(subscriber_id, &context_id, q.key.clone());
    LEDGER_WATCH_EVENTS
        .with_label_values(&[&context_id, "subscribe"])
        .inc();

    let (out_tx, out_rx) = mpsc::channel::<Arc<Entry>>(256);
    let store = state.store.clone();
    let ctx = context_id.clone();
    let key_filter = q.key.clone();
    let from_sequence = q.from_sequence;

    tokio::spawn(async move {
        let mut last_sent = from_sequence;

        let mut options = GetOptions::all().after(from_sequence);
        if let Some(key) = &key_filter {
            options = options.with_key(key.clone());
        }
        if let Ok((catchup, _)) = store.get(&ctx, &options).await {
            for entry in catchup {
                last_sent = last_sent.max(entry.sequence);
                if out_tx.send(Arc::new(entry)).await.is_err() {
                    store.watch().unsubscribe(subscriber_id, &ctx);
                    return;
                }
            }
        }

        // Drain anything the live subscription buffered during catch-up,
        // deduplicating by sequence against what catch-up already sent.
        while let Ok(buffered) = live_rx.try_recv() {
            if buffered.sequence > last_sent {
                last_sent = buffered.sequence;
                if out_tx.send(buffered).await.is_err() {
                    store.watch().unsubscribe(subscriber_id, &ctx);
                    return;
                }
            }
        }

        // Switch to direct live forwarding.
        while let Some(entry) = live_rx.recv().await {
            if entry.sequence > last_sent {
                last_sent = entry.sequence;
                if out_tx.send(entry).await.is_err() {
                    break;
                }
            }
        }
        store.watch().unsubscribe(subscriber_id, &ctx);
        LEDGER_WATCH_EVENTS
            .with_label_values(&[&ctx, "unsubscribe"])
            .inc();
    });

    let stream = ReceiverStream::new(out_rx).map(|entry| {
        let dto = EntryDto::from(entry.as_ref());
        let json = serde_json::to_string(&dto).unwrap_or_default();
        Ok::<Event, Infallible>(Event::default().event("entry").data(json))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
