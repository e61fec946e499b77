//! HSM fault tracking.
//!
//! A monotonic last-error-time, not a boolean flag, so recovery happens
//! automatically at a deadline instead of requiring an explicit reset
//! message. Issuance and OCSP signing share one instance: observing a
//! fault through either path blocks both.

use crate::error::{CaError, Result};
use crate::metrics::FaultMetrics;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Thread-safe fault window tracker.
pub struct FaultTracker {
    timeout: Duration,
    last_error: Mutex<Option<Instant>>,
    metrics: FaultMetrics,
}

impl FaultTracker {
    /// Creates a tracker with no recorded fault.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_error: Mutex::new(None),
            metrics: FaultMetrics::new(),
        }
    }

    /// Returns `Err(HsmUnavailable)` if a fault was recorded less than
    /// `timeout` ago, else `Ok(())`. Call before attempting the signing
    /// backend.
    pub fn check(&self) -> Result<()> {
        let guard = self.last_error.lock().unwrap();
        if let Some(t) = *guard {
            if t.elapsed() < self.timeout {
                drop(guard);
                self.metrics.record_rejected();
                return Err(CaError::HsmUnavailable);
            }
        }
        Ok(())
    }

    /// Records that the signing backend just failed. Call on any
    /// backend error, regardless of whether `check()` was consulted.
    pub fn record(&self) {
        *self.last_error.lock().unwrap() = Some(Instant::now());
        self.metrics.record_observed();
    }

    /// Access to the underlying metrics, for callers that want to
    /// report or assert on `hsmFault.observed`/`hsmFault.rejected`.
    pub fn metrics(&self) -> &FaultMetrics {
        &self.metrics
    }
}
