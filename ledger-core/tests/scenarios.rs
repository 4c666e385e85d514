//! Property-based (P1-P10) and scenario (S1-S9) integration tests.
//!
//! Unit-level coverage for each component already lives in its own
//! `#[cfg(test)]` module; this file exercises the properties and concrete
//! scenarios that span the public `Store`/`WatchRegistry` contract, the
//! way `ubl-server/tests/` holds integration-level tests separate from
//! unit tests colocated with source.

use std::collections::BTreeMap;
use std::sync::Arc;

use quickcheck::TestResult;
use quickcheck_macros::quickcheck;

use ledger_core::merkle;
use ledger_core::{store::LoadOptions, Entry, GetOptions, Store};

fn rt() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().unwrap()
}

fn md() -> BTreeMap<String, String> {
    BTreeMap::new()
}

/// P1: for N appends, current_sequence = N and retrieved sequences are exactly [1..N].
#[quickcheck]
fn p1_contiguous_sequence(n: u8) -> TestResult {
    if n == 0 {
        return TestResult::discard();
    }
    let n = n as u64;
    rt().block_on(async {
        let store = Store::new();
        for i in 0..n {
            store
                .append("ctx", "facts", i.to_be_bytes().to_vec(), md())
                .await
                .unwrap();
        }
        let (entries, latest) = store.get("ctx", &GetOptions::all()).await.unwrap();
        let seqs: Vec<u64> = entries.iter().map(|e| e.sequence).collect();
        TestResult::from_bool(latest == n && seqs == (1..=n).collect::<Vec<_>>())
    })
}

/// P2: every entry returned by `get` re-verifies its own content hash.
#[quickcheck]
fn p2_returned_entries_verify_hash(payloads: Vec<Vec<u8>>) -> TestResult {
    if payloads.is_empty() || payloads.len() > 30 {
        return TestResult::discard();
    }
    rt().block_on(async {
        let store = Store::new();
        for p in &payloads {
            store.append("ctx", "facts", p.clone(), md()).await.unwrap();
        }
        let (entries, _) = store.get("ctx", &GetOptions::all()).await.unwrap();
        TestResult::from_bool(entries.iter().all(|e| e.verify_hash().unwrap_or(false)))
    })
}

/// P3: within a context, sequence(a) < sequence(b) implies lamport(a) < lamport(b).
#[quickcheck]
fn p3_lamport_monotonic_with_sequence(n: u8) -> TestResult {
    if n < 2 {
        return TestResult::discard();
    }
    let n = n as u64;
    rt().block_on(async {
        let store = Store::new();
        for i in 0..n {
            store
                .append("ctx", "facts", i.to_be_bytes().to_vec(), md())
                .await
                .unwrap();
        }
        let (entries, _) = store.get("ctx", &GetOptions::all()).await.unwrap();
        let ok = entries
            .windows(2)
            .all(|w| w[0].sequence < w[1].sequence && w[0].lamport_clock < w[1].lamport_clock);
        TestResult::from_bool(ok)
    })
}

/// P4: operations on context X leave context Y's counters, clocks, and entries untouched.
#[quickcheck]
fn p4_context_isolation(n_x: u8, n_y: u8) -> TestResult {
    if n_x == 0 || n_y == 0 {
        return TestResult::discard();
    }
    rt().block_on(async {
        let store = Store::new();
        for _ in 0..n_y {
            store.append("Y", "f", b"y".to_vec(), md()).await.unwrap();
        }
        let y_seq_before = store.current_sequence("Y");
        let y_lamport_before = store.current_lamport_time("Y");
        let (y_entries_before, _) = store.get("Y", &GetOptions::all()).await.unwrap();

        for _ in 0..n_x {
            store.append("X", "f", b"x".to_vec(), md()).await.unwrap();
        }

        let (y_entries_after, _) = store.get("Y", &GetOptions::all()).await.unwrap();
        TestResult::from_bool(
            store.current_sequence("Y") == y_seq_before
                && store.current_lamport_time("Y") == y_lamport_before
                && y_entries_before == y_entries_after,
        )
    })
}

/// P5: snapshot/load round-trips payloads, keys, metadata, and sequence values.
#[quickcheck]
fn p5_snapshot_load_round_trip(n: u8) -> TestResult {
    if n == 0 || n > 30 {
        return TestResult::discard();
    }
    rt().block_on(async {
        let store = Store::new();
        for i in 0..n {
            let mut m = BTreeMap::new();
            m.insert("i".to_string(), i.to_string());
            store
                .append("source", "facts", i.to_be_bytes().to_vec(), m)
                .await
                .unwrap();
        }
        let (blob, _seq, _meta) = store.snapshot("source").await.unwrap();
        let (restored, _) = store
            .load("target", &blob, LoadOptions::default())
            .await
            .unwrap();

        let (source_entries, _) = store.get("source", &GetOptions::all()).await.unwrap();
        let (target_entries, _) = store.get("target", &GetOptions::all()).await.unwrap();

        let matches = source_entries.iter().zip(target_entries.iter()).all(|(s, t)| {
            s.payload == t.payload && s.key == t.key && s.metadata == t.metadata && s.sequence == t.sequence && s.id != t.id
        });
        TestResult::from_bool(restored == n as usize && matches)
    })
}

/// P6: any single-byte mutation of any leaf hash changes the Merkle root.
#[quickcheck]
fn p6_leaf_mutation_changes_root(seed: Vec<u8>, index: u8) -> TestResult {
    if seed.len() < 2 {
        return TestResult::discard();
    }
    let leaves: Vec<[u8; 32]> = seed.iter().map(|b| ledger_core::hash::hash(&[*b])).collect();
    let index = (index as usize) % leaves.len();
    let original_root = merkle::root(&leaves);

    let mut mutated = leaves.clone();
    mutated[index][0] ^= 0xFF;
    if mutated[index] == leaves[index] {
        return TestResult::discard();
    }
    TestResult::from_bool(merkle::root(&mutated) != original_root)
}

/// P6 (end-to-end): mutating a hash-included field of an entry inside a
/// real snapshot blob — without touching its now-stale `content_hash` —
/// must still be caught. Unlike `p6_leaf_mutation_changes_root` above,
/// which only exercises `merkle::root` over synthetic leaf bytes, this
/// goes through the actual snapshot/decode/verify path `load` uses.
#[tokio::test]
async fn p6_entry_payload_mutation_is_caught_through_snapshot_path() {
    let store = Store::new();
    for i in 1..=5u32 {
        store
            .append("ctx", "facts", format!("p{i}").into_bytes(), md())
            .await
            .unwrap();
    }
    let (blob, ..) = store.snapshot("ctx").await.unwrap();
    let mut decoded = ledger_core::snapshot::decode(&blob).unwrap();
    let stored_root = decoded.merkle_root.clone();

    // Mutate a hash-included field but leave the stale `content_hash` as
    // a tampering client would; the stored root is untouched too.
    decoded.entries[2].payload = b"tampered".to_vec();
    assert_eq!(decoded.merkle_root, stored_root);

    let err = ledger_core::snapshot::verify_integrity(&decoded).unwrap_err();
    assert!(matches!(
        err,
        ledger_core::LedgerError::IntegrityVerificationFailed { .. }
    ));
}

/// P7: a proof for index i verifies against the root and verifies for no other leaf.
#[quickcheck]
fn p7_proof_is_index_specific(n: u8) -> TestResult {
    if n == 0 || n > 40 {
        return TestResult::discard();
    }
    let leaves: Vec<[u8; 32]> = (0..n).map(|i| ledger_core::hash::hash(&[i])).collect();
    let root = merkle::root(&leaves);
    let mut all_ok = true;
    for i in 0..leaves.len() {
        let proof = merkle::prove(&leaves, i).unwrap();
        if !merkle::verify(&leaves[i], &proof, &root) {
            all_ok = false;
        }
        for (j, leaf) in leaves.iter().enumerate() {
            if j != i && merkle::verify(leaf, &proof, &root) {
                all_ok = false;
            }
        }
    }
    TestResult::from_bool(all_ok)
}

/// P8: `update(received)` is strictly greater than both the prior value and
/// `received`; `tick` is strictly greater than the prior value.
#[quickcheck]
fn p8_clock_advances_strictly(ticks: u8, received: u16) -> bool {
    let mut c = ledger_core::LamportClock::new();
    for _ in 0..ticks {
        let prior = c.get();
        let next = c.tick();
        if next <= prior {
            return false;
        }
    }
    let prior = c.get();
    let next = c.update(received as u64);
    next > prior && next > received as u64
}

/// P9: concurrent appends to the same context produce unique, consecutive
/// sequence numbers covering exactly [1..N].
#[quickcheck]
fn p9_concurrent_appends_are_consecutive(n: u8) -> TestResult {
    if n == 0 || n > 50 {
        return TestResult::discard();
    }
    let n = n as usize;
    rt().block_on(async {
        let store = Arc::new(Store::new());
        let mut handles = Vec::with_capacity(n);
        for i in 0..n {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append("ctx", "facts", i.to_be_bytes().to_vec(), BTreeMap::new())
                    .await
                    .unwrap()
                    .sequence
            }));
        }
        let mut seqs = Vec::with_capacity(n);
        for h in handles {
            seqs.push(h.await.unwrap());
        }
        seqs.sort_unstable();
        TestResult::from_bool(seqs == (1..=n as u64).collect::<Vec<_>>())
    })
}

/// P10: subscriber count equals live subscriptions and drops to zero once
/// every subscriber has terminated; no notifications reach dead subscribers.
#[tokio::test]
async fn p10_subscriber_count_tracks_liveness() {
    let store = Store::new();
    {
        let (_r1, _rx1) = store.watch().subscribe(1, "ctx", None);
        let (_r2, _rx2) = store.watch().subscribe(2, "ctx", None);
        assert_eq!(store.watch().subscriber_count("ctx"), 2);
    }
    store.append("ctx", "facts", b"x".to_vec(), BTreeMap::new()).await.unwrap();
    assert_eq!(store.watch().subscriber_count("ctx"), 0);
}

fn payload(n: u32) -> Vec<u8> {
    format!("p{n}").into_bytes()
}

/// S1 basic round-trip.
#[tokio::test]
async fn s1_basic_round_trip() {
    let store = Store::new();
    store.append("ctx", "facts", b"p1".to_vec(), md()).await.unwrap();
    let (entries, _) = store.get("ctx", &GetOptions::all()).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].sequence, 1);
    assert_eq!(entries[0].lamport_clock, Some(1));
    assert_eq!(entries[0].payload, b"p1");
    assert_eq!(store.current_sequence("ctx"), 1);
}

/// S4 pagination across four pages of 25.
#[tokio::test]
async fn s4_four_pages_cover_disjoint_contiguous_range() {
    let store = Store::new();
    for i in 1..=100u32 {
        store.append("ctx", "facts", payload(i), md()).await.unwrap();
    }
    let mut covered = Vec::new();
    for after in [0u64, 25, 50, 75] {
        let (entries, _) = store
            .get("ctx", &GetOptions::all().after(after).limit(25))
            .await
            .unwrap();
        covered.extend(entries.into_iter().map(|e| e.sequence));
    }
    assert_eq!(covered, (1..=100).collect::<Vec<_>>());
}

/// S8 watch live delivery with a key filter.
#[tokio::test]
async fn s8_watch_delivers_only_matching_key_in_order() {
    let store = Store::new();
    let (_subref, mut rx) = store.watch().subscribe(1, "ctx", Some("facts".to_string()));

    store.append("ctx", "intents", payload(1), md()).await.unwrap();
    store.append("ctx", "facts", payload(2), md()).await.unwrap();
    store.append("ctx", "facts", payload(3), md()).await.unwrap();
    store.append("ctx", "traces", payload(4), md()).await.unwrap();

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(first.payload, payload(2));
    assert_eq!(second.payload, payload(3));
    assert!(rx.try_recv().is_err());
}

/// S9 subscriber crash cleanup: a subscriber that drops its receiver without
/// unsubscribing is pruned the next time the registry touches its context.
#[tokio::test]
async fn s9_subscriber_drop_is_cleaned_up() {
    let store = Store::new();
    async fn subscribe_and_vanish(store: &Store) {
        let (_subref, _rx) = store.watch().subscribe(7, "ctx", None);
    }
    subscribe_and_vanish(&store).await;
    assert_eq!(store.watch().subscriber_count("ctx"), 0);
}

/// Entry equality sanity check backing P4/P5's structural comparisons.
#[test]
fn entry_equality_is_field_wise() {
    let a = Entry {
        id: "a".into(),
        context_id: "ctx".into(),
        key: "k".into(),
        payload: vec![1],
        sequence: 1,
        appended_at_ns: 0,
        metadata: BTreeMap::new(),
        lamport_clock: Some(1),
        content_hash: None,
    };
    let b = a.clone();
    assert_eq!(a, b);
}
