//! Environment-driven configuration (SPEC §6), loaded the way
//! `ubl-server/src/snapshots.rs` reads `UBL_DATA_DIR`: a named constant for
//! the default colocated with the reader that falls back to it.

use ledger_core::store::DEFAULT_MAX_PAYLOAD_BYTES;

const DEFAULT_PORT: u16 = 50051;
const DEFAULT_DATA_DIR: &str = "./data";

/// Listen port for the HTTP transport adaptor. `LEDGER_PORT`, default 50051
/// (the gRPC default SPEC §6 names; this adaptor reuses it as a plain HTTP
/// port since spec.md only pins the transport's *argument fields*, not its
/// wire protocol).
pub fn listen_port() -> u16 {
    std::env::var("LEDGER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

/// Persistent storage root. `LEDGER_DATA_DIR`, default `./data`. Unused by
/// the in-memory table backend today; read and logged at startup so a
/// future durable backend (SPEC §9) can be wired in without touching the
/// adaptor's configuration surface.
pub fn data_dir() -> String {
    std::env::var("LEDGER_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string())
}

/// Per-entry payload size ceiling in bytes. `LEDGER_MAX_PAYLOAD_BYTES`,
/// default 4 MiB.
pub fn max_payload_bytes() -> usize {
    std::env::var("LEDGER_MAX_PAYLOAD_BYTES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_PAYLOAD_BYTES)
}
