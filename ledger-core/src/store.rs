//! The Store: the ledger core's public contract.
//!
//! Every operation is all-or-nothing: a transaction that aborts leaves no
//! partial state, and input validation happens before any table is
//! touched. Each call is wrapped in a deadline so a stuck lock surfaces as
//! [`LedgerError::Internal`] rather than hanging the caller forever, a
//! bounded-wait discipline for foreground operations.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::entry::{Entry, GetOptions};
use crate::error::{LedgerError, Result};
use crate::hash::to_hex;
use crate::snapshot::{self, SnapshotBlob, SnapshotMetadata};
use crate::tables::Tables;
use crate::watch::WatchRegistry;

/// Default per-entry payload size ceiling: 4 MiB.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 4 * 1024 * 1024;

/// Default deadline for a single Store operation's critical section.
pub const DEFAULT_OPERATION_DEADLINE: Duration = Duration::from_secs(5);

/// Options for [`Store::load`].
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// If true and the target context already has entries, fail with
    /// [`LedgerError::ContextAlreadyExists`]. Default: false.
    pub fail_if_exists: bool,
    /// Recompute the blob's Merkle root and compare to its recorded root
    /// before writing anything. Default: true.
    pub verify_integrity: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            fail_if_exists: false,
            verify_integrity: true,
        }
    }
}

/// The transactional facade over the storage tables, integrity machinery,
/// and watch registry.
pub struct Store {
    tables: Tables,
    watch: WatchRegistry,
    max_payload_bytes: usize,
    operation_deadline: Duration,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// A store with default payload limit and operation deadline.
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_PAYLOAD_BYTES, DEFAULT_OPERATION_DEADLINE)
    }

    /// A store with an explicit payload limit and operation deadline.
    pub fn with_limits(max_payload_bytes: usize, operation_deadline: Duration) -> Self {
        Self {
            tables: Tables::new(),
            watch: WatchRegistry::new(),
            max_payload_bytes,
            operation_deadline,
        }
    }

    /// The watch registry backing this store, for subscribing to live updates.
    pub fn watch(&self) -> &WatchRegistry {
        &self.watch
    }

    /// Appends one entry to `context_id`, assigning the next sequence
    /// number and ticking the context's Lamport clock.
    #[instrument(skip(self, payload, metadata), fields(context_id, key))]
    pub async fn append(
        &self,
        context_id: &str,
        key: &str,
        payload: Vec<u8>,
        metadata: BTreeMap<String, String>,
    ) -> Result<Entry> {
        self.append_inner(context_id, key, payload, metadata, None)
            .await
    }

    /// Appends one entry, advancing the Lamport clock via `update(received)`
    /// instead of a plain `tick`, to propagate causal time from another
    /// context.
    #[instrument(skip(self, payload, metadata), fields(context_id, key, received))]
    pub async fn append_with_received_time(
        &self,
        context_id: &str,
        key: &str,
        payload: Vec<u8>,
        received: u64,
        metadata: BTreeMap<String, String>,
    ) -> Result<Entry> {
        self.append_inner(context_id, key, payload, metadata, Some(received))
            .await
    }

    async fn append_inner(
        &self,
        context_id: &str,
        key: &str,
        payload: Vec<u8>,
        metadata: BTreeMap<String, String>,
        received: Option<u64>,
    ) -> Result<Entry> {
        if payload.len() > self.max_payload_bytes {
            return Err(LedgerError::PayloadTooLarge {
                actual: payload.len(),
                max: self.max_payload_bytes,
            });
        }

        let context_id = context_id.to_string();
        let key = key.to_string();
        let lock_key = context_id.clone();

        let entry = self
            .with_deadline(self.tables.with_write_lock(&lock_key, move |tables| {
                let sequence = tables.bump_sequence(&context_id);
                let lamport_clock = match received {
                    Some(r) => tables.update_lamport(&context_id, r),
                    None => tables.tick_lamport(&context_id),
                };
                let appended_at_ns = now_ns();
                let content_hash = to_hex(&crate::hash::hash_entry(
                    &context_id,
                    &key,
                    &payload,
                    sequence,
                    appended_at_ns,
                ));

                let entry = Entry {
                    id: Entry::new_id(),
                    context_id: context_id.clone(),
                    key: key.clone(),
                    payload,
                    sequence,
                    appended_at_ns,
                    metadata,
                    lamport_clock: Some(lamport_clock),
                    content_hash: Some(content_hash),
                };

                tables.insert_entry(entry.clone());
                entry
            }))
            .await
            .map_err(|e| LedgerError::AppendFailed(e.to_string()))?;

        info!(
            context_id = %entry.context_id,
            sequence = entry.sequence,
            lamport_clock = ?entry.lamport_clock,
            "entry appended"
        );
        self.watch.notify(&entry);
        Ok(entry)
    }

    /// Reads entries for `context_id`, filtered and ordered by ascending
    /// sequence, alongside the context's current sequence counter.
    pub async fn get(&self, context_id: &str, options: &GetOptions) -> Result<(Vec<Entry>, u64)> {
        let context_id = context_id.to_string();
        let options = options.clone();
        self.with_deadline(async {
            let latest_sequence = self.tables.current_sequence(&context_id);
            let mut entries = self.tables.entries_for_context(&context_id);

            if let Some(key) = &options.key {
                entries.retain(|e| &e.key == key);
            }
            if let Some(after) = options.after_sequence {
                entries.retain(|e| e.sequence > after);
            }
            if let Some(limit) = options.limit {
                if limit > 0 {
                    entries.truncate(limit);
                }
            }

            Ok((entries, latest_sequence))
        })
        .await
        .map_err(|e| LedgerError::GetFailed(e.to_string()))?
    }

    /// Current sequence counter for a context (0 if unknown). Never
    /// creates state for an unknown context.
    pub fn current_sequence(&self, context_id: &str) -> u64 {
        self.tables.current_sequence(context_id)
    }

    /// Current Lamport time for a context (0 if unknown). Never creates
    /// state for an unknown context.
    pub fn current_lamport_time(&self, context_id: &str) -> u64 {
        self.tables.current_lamport(context_id)
    }

    /// Captures a versioned, integrity-checked snapshot of `context_id`.
    pub async fn snapshot(
        &self,
        context_id: &str,
    ) -> Result<(SnapshotBlob, u64, SnapshotMetadata)> {
        let context_id = context_id.to_string();
        self.with_deadline(async {
            let entries = self.tables.entries_for_context(&context_id);
            let sequence = self.tables.current_sequence(&context_id);
            let created_at_ns = now_ns();
            let (blob, metadata) =
                snapshot::encode(&context_id, &entries, sequence, created_at_ns)?;
            Ok((blob, sequence, metadata))
        })
        .await
        .map_err(|e| LedgerError::SnapshotFailed(e.to_string()))?
    }

    /// Restores entries from a snapshot blob into `context_id`.
    ///
    /// When `context_id` differs from the blob's source context, entry ids
    /// are regenerated (ids must stay globally unique and are not part of
    /// the integrity hash) and each entry's `content_hash` is recomputed,
    /// since the hash covers `context_id`. The target's Lamport clock is
    /// left untouched: imported entries keep their original
    /// `lamport_clock` values even though the target's clock does not
    /// advance to match them.
    #[instrument(skip(self, blob), fields(context_id))]
    pub async fn load(
        &self,
        context_id: &str,
        blob: &SnapshotBlob,
        options: LoadOptions,
    ) -> Result<(usize, u64)> {
        let decoded = snapshot::decode(blob)?;

        if options.verify_integrity {
            snapshot::verify_integrity(&decoded)?;
        }

        if options.fail_if_exists && self.tables.context_exists(context_id) {
            return Err(LedgerError::ContextAlreadyExists(context_id.to_string()));
        }

        let target_context_id = context_id.to_string();
        let lock_key = target_context_id.clone();
        let cross_context = decoded.source_context_id != target_context_id;
        let mut entries = decoded.entries;
        entries.sort_by_key(|e| e.sequence);
        let source_sequence = decoded.sequence;
        let restored_count = entries.len();

        let result = self
            .with_deadline(self.tables.with_write_lock(&lock_key, move |tables| {
                for mut entry in entries {
                    if cross_context {
                        entry.id = Entry::new_id();
                        entry.context_id = target_context_id.clone();
                        entry.content_hash = Some(entry.compute_content_hash());
                    }
                    tables.insert_entry(entry);
                }
                tables.raise_sequence(&target_context_id, source_sequence)
            }))
            .await
            .map_err(|e| LedgerError::LoadFailed(e.to_string()))?;

        warn!(
            context_id = %context_id,
            restored = restored_count,
            latest_sequence = result,
            "context loaded from snapshot"
        );
        Ok((restored_count, result))
    }

    async fn with_deadline<F, T>(&self, fut: F) -> std::result::Result<T, String>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::time::timeout(self.operation_deadline, fut)
            .await
            .map_err(|_| "operation timed out".to_string())
    }
}

fn now_ns() -> i128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as i128)
        .unwrap_or(0)
}
