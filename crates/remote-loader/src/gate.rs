//! Admission control for outbound fetches.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::LoadError;

/// The default number of fetches allowed to run at the same time.
pub const MAX_CONCURRENT_FETCHES: usize = 10;

/// A counting gate that limits the number of network fetches in flight.
///
/// Callers [`acquire`](Self::acquire) a [`FetchPermit`] and hold it for the duration of the
/// fetch. The slot is returned when the permit is dropped, which happens on every exit path,
/// including errors and cancellation of the surrounding future.
#[derive(Clone, Debug)]
pub struct FetchGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl FetchGate {
    /// Creates a gate allowing `capacity` concurrent fetches.
    ///
    /// A capacity of `0` would never admit anything and is raised to `1`.
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            tracing::warn!("max_concurrent_fetches is 0, allowing a single fetch instead");
            1
        } else {
            capacity.min(Semaphore::MAX_PERMITS)
        };

        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// The maximum number of concurrent fetches.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of fetches currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    /// Waits until a fetch slot is free and reserves it.
    ///
    /// Fails only if the gate was closed, which this crate never does.
    pub async fn acquire(&self) -> Result<FetchPermit, LoadError> {
        let start = Instant::now();
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(LoadError::from_std_error)?;

        metric!(timer("gate.wait_duration") = start.elapsed());
        metric!(gauge("gate.in_flight") = self.in_flight() as u64);

        Ok(FetchPermit {
            _permit: permit,
            gate: self.clone(),
        })
    }
}

impl Default for FetchGate {
    fn default() -> Self {
        Self::new(MAX_CONCURRENT_FETCHES)
    }
}

/// A reserved fetch slot, released on drop.
#[derive(Debug)]
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct FetchPermit {
    _permit: OwnedSemaphorePermit,
    gate: FetchGate,
}

impl Drop for FetchPermit {
    fn drop(&mut self) {
        // `_permit` is returned right after this, so it still counts as in flight here.
        let in_flight = self.gate.in_flight().saturating_sub(1);
        metric!(gauge("gate.in_flight") = in_flight as u64);
    }
}
