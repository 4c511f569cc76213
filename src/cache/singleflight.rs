//! Request coalescing for origin fetches.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::watch;

use crate::fetch::FetchError;

/// The value every coalesced caller observes: shared bytes or a shared
/// error.
pub type FlightResult = Result<Bytes, Arc<FetchError>>;

type Slot = watch::Receiver<Option<FlightResult>>;

/// Coalesces concurrent work per key: while one call is in flight, later
/// calls with the same key wait for its result instead of running their own.
///
/// The leader runs on a detached task, so a caller that disconnects cannot
/// cancel work other waiters (and the cache) still need. After completion
/// the record is removed and a later call runs fresh.
#[derive(Default)]
pub struct Group {
    inflight: Mutex<HashMap<String, Slot>>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` under `key`, or join an in-flight run of the same key.
    pub async fn run<F, Fut>(self: &Arc<Self>, key: &str, work: F) -> FlightResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes, FetchError>> + Send + 'static,
    {
        let mut rx = {
            let mut inflight = self.inflight.lock().expect("singleflight mutex poisoned");
            if let Some(rx) = inflight.get(key) {
                rx.clone()
            } else {
                let (tx, rx) = watch::channel(None);
                inflight.insert(key.to_string(), rx.clone());

                let group = Arc::clone(self);
                let owned_key = key.to_string();
                let fut = work();
                tokio::spawn(async move {
                    let result = match fut.await {
                        Ok(body) => Ok(body),
                        Err(e) => Err(Arc::new(e)),
                    };
                    // Remove before publishing so a caller arriving after
                    // the result starts a fresh flight.
                    group
                        .inflight
                        .lock()
                        .expect("singleflight mutex poisoned")
                        .remove(&owned_key);
                    let _ = tx.send(Some(result));
                });
                rx
            }
        };

        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(result) = current {
                return result;
            }
            if rx.changed().await.is_err() {
                // Leader task died without publishing (panic); surface as an
                // aborted fetch rather than hanging the waiters.
                return Err(Arc::new(FetchError::Aborted));
            }
        }
    }
}
