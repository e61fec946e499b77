//! Process-wide counters for HSM fault events.
//!
//! The original system emits these as RPC/StatsD counters
//! (`hsmFault.observed`, `hsmFault.rejected`); this crate has no RPC
//! framing of its own, so the counters are plain atomics that a caller
//! can sample and a `tracing::info!` call logs on every increment.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters tracking HSM fault observations and rejections.
#[derive(Debug, Default)]
pub struct FaultMetrics {
    observed: AtomicU64,
    rejected: AtomicU64,
}

impl FaultMetrics {
    /// Creates a zeroed counter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments `hsmFault.observed`, i.e. the signing backend itself
    /// returned an error.
    pub fn record_observed(&self) {
        self.observed.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(metric = "hsmFault.observed", "HSM fault observed");
    }

    /// Increments `hsmFault.rejected`, i.e. a caller was turned away
    /// because the fault window was still open.
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(metric = "hsmFault.rejected", "call rejected during HSM fault window");
    }

    /// Current value of `hsmFault.observed`.
    pub fn observed(&self) -> u64 {
        self.observed.load(Ordering::Relaxed)
    }

    /// Current value of `hsmFault.rejected`.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}
