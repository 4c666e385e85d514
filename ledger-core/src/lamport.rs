//! Per-context Lamport logical clock.

/// A single Lamport clock. The ledger keeps one per context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct LamportClock(u64);

impl LamportClock {
    /// A fresh clock, starting at 0.
    pub fn new() -> Self {
        Self(0)
    }

    /// Current value without advancing.
    pub fn get(&self) -> u64 {
        self.0
    }

    /// `t <- t + 1`; returns the new value.
    pub fn tick(&mut self) -> u64 {
        self.0 += 1;
        self.0
    }

    /// `t <- max(t, received) + 1`; returns the new value.
    pub fn update(&mut self, received: u64) -> u64 {
        self.0 = self.0.max(received) + 1;
        self.0
    }
}

/// `happened_before(a, b) <=> a < b`, i.e. plain integer comparison.
pub fn happened_before(a: u64, b: u64) -> bool {
    a < b
}
