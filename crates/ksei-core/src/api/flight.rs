//! Single-flight request coalescing.
//!
//! Concurrent calls for the same key share one execution: the first caller
//! registers a shared pending result, later callers attach to it, and the
//! entry is dropped from the map the moment the operation finishes. Nothing
//! is cached past that point. Operations run on their own task and are never
//! cancelled by callers going away.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::debug;

use super::{Error, Result};

type Pending<T> = Shared<BoxFuture<'static, Result<T>>>;

/// Result of [`FlightGroup::run`].
#[derive(Debug, Clone)]
pub struct Landed<T> {
    pub result: Result<T>,
    /// `true` when this caller attached to an operation another caller started.
    pub joined: bool,
}

pub struct FlightGroup<T> {
    inflight: Arc<Mutex<HashMap<String, Pending<T>>>>,
}

impl<T> Clone for FlightGroup<T> {
    fn clone(&self) -> Self {
        Self {
            inflight: Arc::clone(&self.inflight),
        }
    }
}

impl<T> Default for FlightGroup<T> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T> FlightGroup<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `operation` for `key`, or wait on the run already in progress.
    ///
    /// `operation` is only started when this caller is the first for the key;
    /// otherwise it is dropped unstarted. A started operation runs on its own
    /// task, so it completes and clears its entry even if every caller stops
    /// waiting.
    pub async fn run<F>(&self, key: &str, operation: F) -> Landed<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let (pending, joined) = {
            let mut inflight = self.inflight.lock().await;
            match inflight.get(key) {
                Some(pending) => (pending.clone(), true),
                None => {
                    let pending = self.launch(key.to_string(), operation);
                    inflight.insert(key.to_string(), pending.clone());
                    (pending, false)
                }
            }
        };

        if joined {
            debug!(key = %key, "Joining in-flight request");
        }

        Landed {
            result: pending.await,
            joined,
        }
    }

    fn launch<F>(&self, key: String, operation: F) -> Pending<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let map = Arc::clone(&self.inflight);
        let handle = tokio::spawn(async move {
            let result = match AssertUnwindSafe(operation).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(Error::Interrupted("operation panicked".to_string())),
            };
            // No new entry can exist for this key until this one is removed,
            // so the removal is always our own.
            map.lock().await.remove(&key);
            result
        });

        async move {
            handle
                .await
                .unwrap_or_else(|e| Err(Error::Interrupted(e.to_string())))
        }
        .boxed()
        .shared()
    }

    /// Number of keys with an operation currently in flight.
    pub async fn in_flight(&self) -> usize {
        self.inflight.lock().await.len()
    }
}
