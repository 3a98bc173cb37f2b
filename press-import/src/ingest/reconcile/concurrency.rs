//! Write concurrency limiter
//!
//! Semaphore-based limiter bounding how many storage writes are in flight at
//! once during an import.

use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Default number of storage writes in flight
pub const DEFAULT_MAX_IN_FLIGHT: usize = 16;

/// Semaphore-based limiter for concurrent storage writes
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max_in_flight: usize,
    writes_acquired: Arc<AtomicU64>,
    writes_waited: Arc<AtomicU64>,
}

impl ConcurrencyLimiter {
    /// Create a limiter; a limit of 0 is treated as 1
    pub fn new(max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            writes_acquired: Arc::new(AtomicU64::new(0)),
            writes_waited: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Acquire a permit for one write. Waits if at capacity.
    /// The permit is released when dropped.
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        if self.semaphore.available_permits() == 0 {
            self.writes_waited.fetch_add(1, Ordering::Relaxed);
            debug!(
                "Write limiter: waiting for permit ({} in flight)",
                self.max_in_flight
            );
        }

        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("write limiter semaphore is never closed");
        self.writes_acquired.fetch_add(1, Ordering::Relaxed);
        permit
    }

    /// Try to acquire a permit without waiting
    #[cfg(test)]
    pub fn try_acquire(&self) -> Option<OwnedSemaphorePermit> {
        let permit = self.semaphore.clone().try_acquire_owned().ok()?;
        self.writes_acquired.fetch_add(1, Ordering::Relaxed);
        Some(permit)
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn stats(&self) -> ConcurrencyStats {
        ConcurrencyStats {
            available_permits: self.available_permits(),
            max_in_flight: self.max_in_flight,
            writes_acquired: self.writes_acquired.load(Ordering::Relaxed),
            writes_waited: self.writes_waited.load(Ordering::Relaxed),
        }
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        ConcurrencyLimiter::new(DEFAULT_MAX_IN_FLIGHT)
    }
}

/// Statistics for the write limiter
#[derive(Debug, Clone)]
pub struct ConcurrencyStats {
    pub available_permits: usize,
    pub max_in_flight: usize,
    /// Total permits handed out
    pub writes_acquired: u64,
    /// Number of times a write had to wait for a permit
    pub writes_waited: u64,
}

impl ConcurrencyStats {
    /// Fraction of writes that had to wait
    pub fn wait_rate(&self) -> f64 {
        if self.writes_acquired == 0 {
            0.0
        } else {
            self.writes_waited as f64 / self.writes_acquired as f64
        }
    }

    pub fn in_use(&self) -> usize {
        self.max_in_flight.saturating_sub(self.available_permits)
    }
}
