//! In-memory storage tables.
//!
//! Three keyed tables — Entries, Sequences, Lamport — realized as plain
//! `HashMap`s behind locks, plus a per-context mutex that callers acquire
//! to serialize the counter+clock+entry-write critical section an append
//! needs: a per-context critical section around the read-modify-write,
//! backed here by an in-memory map rather than a persistent backend. A
//! durable backend (an embedded key-value store) is a drop-in future
//! alternative behind the same four operations (`read`, `write`,
//! `index_read`, the per-context lock) — see DESIGN.md.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::Mutex as AsyncMutex;

use crate::entry::Entry;

/// Owns all three tables and the per-context write locks guarding them.
#[derive(Default)]
pub struct Tables {
    entries_by_id: RwLock<HashMap<String, Entry>>,
    /// context_id -> entry ids, in commit (ascending sequence) order.
    context_index: RwLock<HashMap<String, Vec<String>>>,
    sequences: RwLock<HashMap<String, u64>>,
    lamport: RwLock<HashMap<String, u64>>,
    context_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl Tables {
    /// An empty table set.
    pub fn new() -> Self {
        Self::default()
    }

    fn context_lock(&self, context_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.context_locks.lock().unwrap();
        locks
            .entry(context_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Runs `f` while holding the exclusive per-context write lock,
    /// serializing it against any other writer on the same context.
    /// Readers of other contexts are never blocked.
    pub async fn with_write_lock<F, T>(&self, context_id: &str, f: F) -> T
    where
        F: FnOnce(&Tables) -> T,
    {
        let lock = self.context_lock(context_id);
        let _guard = lock.lock().await;
        f(self)
    }

    /// Current sequence counter for a context (0 if unknown).
    pub fn current_sequence(&self, context_id: &str) -> u64 {
        *self.sequences.read().unwrap().get(context_id).unwrap_or(&0)
    }

    /// Current Lamport time for a context (0 if unknown).
    pub fn current_lamport(&self, context_id: &str) -> u64 {
        *self.lamport.read().unwrap().get(context_id).unwrap_or(&0)
    }

    /// Increments the sequence counter and returns the new value. Caller
    /// must hold the context's write lock.
    pub fn bump_sequence(&self, context_id: &str) -> u64 {
        let mut seqs = self.sequences.write().unwrap();
        let entry = seqs.entry(context_id.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Raises the sequence counter to `at_least` if it is currently lower.
    /// Caller must hold the context's write lock.
    pub fn raise_sequence(&self, context_id: &str, at_least: u64) -> u64 {
        let mut seqs = self.sequences.write().unwrap();
        let entry = seqs.entry(context_id.to_string()).or_insert(0);
        *entry = (*entry).max(at_least);
        *entry
    }

    /// `tick` on the context's Lamport clock. Caller must hold the write lock.
    pub fn tick_lamport(&self, context_id: &str) -> u64 {
        let mut clocks = self.lamport.write().unwrap();
        let entry = clocks.entry(context_id.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    /// `update(received)` on the context's Lamport clock. Caller must hold
    /// the write lock.
    pub fn update_lamport(&self, context_id: &str, received: u64) -> u64 {
        let mut clocks = self.lamport.write().unwrap();
        let entry = clocks.entry(context_id.to_string()).or_insert(0);
        *entry = (*entry).max(received) + 1;
        *entry
    }

    /// Inserts a freshly-committed entry. Caller must hold the write lock
    /// for `entry.context_id`. Re-inserting an id already present in the
    /// context's index (a same-context `load` re-applying a snapshot)
    /// overwrites the stored entry without duplicating the index entry.
    pub fn insert_entry(&self, entry: Entry) {
        let id = entry.id.clone();
        let context_id = entry.context_id.clone();
        self.entries_by_id.write().unwrap().insert(id.clone(), entry);
        let mut index = self.context_index.write().unwrap();
        let ids = index.entry(context_id).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    /// All entries for a context, in ascending sequence order.
    pub fn entries_for_context(&self, context_id: &str) -> Vec<Entry> {
        let index = self.context_index.read().unwrap();
        let entries = self.entries_by_id.read().unwrap();
        index
            .get(context_id)
            .map(|ids| ids.iter().filter_map(|id| entries.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    /// Entry lookup by id, across all contexts.
    pub fn get_entry_by_id(&self, id: &str) -> Option<Entry> {
        self.entries_by_id.read().unwrap().get(id).cloned()
    }

    /// Whether a context has any committed entries.
    pub fn context_exists(&self, context_id: &str) -> bool {
        self.context_index
            .read()
            .unwrap()
            .get(context_id)
            .is_some_and(|ids| !ids.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(context_id: &str, sequence: u64) -> Entry {
        Entry {
            id: Entry::new_id(),
            context_id: context_id.to_string(),
            key: "facts".into(),
            payload: vec![],
            sequence,
            appended_at_ns: 0,
            metadata: Default::default(),
            lamport_clock: Some(sequence),
            content_hash: None,
        }
    }

    #[tokio::test]
    async fn bump_sequence_is_contiguous() {
        let tables = Tables::new();
        for expected in 1..=5 {
            let seq = tables
                .with_write_lock("ctx", |t| t.bump_sequence("ctx"))
                .await;
            assert_eq!(seq, expected);
        }
    }

    #[tokio::test]
    async fn contexts_are_isolated() {
        let tables = Tables::new();
        tables
            .with_write_lock("X", |t| {
                t.bump_sequence("X");
                t.insert_entry(entry("X", 1));
            })
            .await;
        assert_eq!(tables.current_sequence("Y"), 0);
        assert!(tables.entries_for_context("Y").is_empty());
        assert_eq!(tables.current_sequence("X"), 1);
    }

    #[tokio::test]
    async fn unknown_context_reads_return_zero_without_creating_state() {
        let tables = Tables::new();
        assert_eq!(tables.current_sequence("ghost"), 0);
        assert_eq!(tables.current_lamport("ghost"), 0);
        assert!(!tables.context_exists("ghost"));
    }

    #[tokio::test]
    async fn raise_sequence_reconciles_counter_to_the_higher_of_the_two() {
        let tables = Tables::new();
        tables
            .with_write_lock("ctx", |t| {
                t.bump_sequence("ctx");
                t.bump_sequence("ctx");
            })
            .await;
        assert_eq!(tables.current_sequence("ctx"), 2);

        // A lower incoming sequence never regresses the counter.
        let raised = tables.raise_sequence("ctx", 1);
        assert_eq!(raised, 2);
        assert_eq!(tables.current_sequence("ctx"), 2);

        // A higher incoming sequence reconciles the counter upward.
        let raised = tables.raise_sequence("ctx", 5);
        assert_eq!(raised, 5);
        assert_eq!(tables.current_sequence("ctx"), 5);
    }
}
