//! Single-flight coalescing of concurrent identical operations.
//!
//! DESIGN
//! ======
//! The first caller for a key spawns the operation as its own task and parks
//! a `Shared` handle to it in the table; concurrent callers for the same key
//! clone and await that handle instead of starting their own. The task runs
//! to completion whether or not anyone is still waiting, and evicts its own
//! table entry on the way out (including on panic).

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

type Table<K, V> = Arc<Mutex<HashMap<K, Flight<V>>>>;

/// `None` when the spawned operation panicked or was aborted.
type Flight<V> = Shared<BoxFuture<'static, Option<V>>>;

pub struct SingleFlight<K, V> {
    calls: Table<K, V>,
}

impl<K, V> Clone for SingleFlight<K, V> {
    fn clone(&self) -> Self {
        Self { calls: self.calls.clone() }
    }
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self { calls: Arc::new(Mutex::new(HashMap::new())) }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `start()` for `key` unless a run for the same key is already in
    /// flight, in which case await that run's result instead. `None` means
    /// the operation panicked.
    pub async fn run<F, Fut>(&self, key: K, start: F) -> Option<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let flight = {
            let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = calls.get(&key) {
                tracing::debug!("joining in-flight operation");
                existing.clone()
            } else {
                let evict = Evict { table: Arc::clone(&self.calls), key: key.clone() };
                let operation = start();
                let task = tokio::spawn(async move {
                    let _evict = evict;
                    operation.await
                });
                let flight = async move {
                    match task.await {
                        Ok(value) => Some(value),
                        Err(e) => {
                            tracing::error!(error = %e, "single-flight operation failed");
                            None
                        }
                    }
                }
                .boxed()
                .shared();
                calls.insert(key, flight.clone());
                flight
            }
        };

        flight.await
    }

    /// Number of operations currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Removes a finished run's table entry when its task ends.
struct Evict<K: Eq + Hash, V> {
    table: Table<K, V>,
    key: K,
}

impl<K: Eq + Hash, V> Drop for Evict<K, V> {
    fn drop(&mut self) {
        self.table.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.key);
    }
}

#[cfg(test)]
#[path = "flight_test.rs"]
mod tests;
