//! Serializes concurrent work on the same identifier.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

/// The per-identifier state shared by every caller currently interested in it.
#[derive(Debug)]
struct SlotEntry {
    /// Held while a caller runs its work for this identifier.
    lock: Arc<tokio::sync::Mutex<()>>,
    /// Number of callers holding or waiting on `lock`.
    refs: usize,
}

type SlotMap = Arc<Mutex<HashMap<String, SlotEntry>>>;

/// Ensures that work for the same identifier never runs concurrently.
///
/// Every identifier with active callers maps to one mutual-exclusion handle. Callers for the
/// same identifier queue up on that handle and run their work one after another, while work for
/// distinct identifiers runs fully in parallel. The result of the work is not shared: a caller
/// that had to wait runs its own work afterwards, which is expected to find the result of its
/// predecessor in a cache.
///
/// Entries are reference counted and removed from the map as soon as the last caller for an
/// identifier is done, so the map only ever holds identifiers that are in use.
#[derive(Clone, Debug, Default)]
pub struct RequestCoalescer {
    slots: SlotMap,
}

impl RequestCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `work` while holding the exclusive slot for `identifier`.
    ///
    /// The slot is released on every exit path, including a panic inside `work` and the
    /// returned future being dropped before completion.
    pub async fn coalesce<F, Fut, T>(&self, identifier: &str, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lease = self.join(identifier);

        let guard = lease.lock.lock().await;
        let output = work().await;
        drop(guard);

        output
    }

    /// The number of identifiers that currently have callers.
    pub fn pending(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Looks up or creates the slot for `identifier` and registers the caller on it.
    fn join(&self, identifier: &str) -> SlotLease {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = slots
            .entry(identifier.to_owned())
            .or_insert_with(|| SlotEntry {
                lock: Default::default(),
                refs: 0,
            });
        entry.refs += 1;
        let lock = Arc::clone(&entry.lock);

        metric!(gauge("coalesce.pending") = slots.len() as u64);

        SlotLease {
            slots: Arc::clone(&self.slots),
            identifier: identifier.to_owned(),
            lock,
        }
    }
}

/// A caller's registration on a slot. Dropping it unregisters the caller.
struct SlotLease {
    slots: SlotMap,
    identifier: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = slots.get_mut(&self.identifier) else {
            tracing::error!(identifier = %self.identifier, "coalescing slot vanished while in use");
            return;
        };

        entry.refs -= 1;
        if entry.refs == 0 {
            slots.remove(&self.identifier);
        }
    }
}
