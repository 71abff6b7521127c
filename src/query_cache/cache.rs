use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::watch;

use crate::query_cache::canonical::canonical_query_key;
use crate::query_cache::QUERY_NAMESPACE_FIELD;

// =============================================================================
// Error Types
// =============================================================================

/// Error type for query cache operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError<E> {
    /// The query could not be canonicalized into a cache key. This is a
    /// construction defect in the query, never retried.
    Key(String),
    /// The underlying operation failed. Failed operations are evicted, not
    /// cached, so an identical later query retries.
    Operation(E),
}

impl<E: fmt::Display> fmt::Display for QueryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Key(msg) => write!(f, "query canonicalization failed: {}", msg),
            QueryError::Operation(e) => write!(f, "{}", e),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for QueryError<E> {}

// =============================================================================
// SwrCache
// =============================================================================

/// A cache hit, carrying whether the value was served stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwrHit<T> {
    /// True when the value predates a staleness mark and a background
    /// refresh was triggered by this call.
    pub stale: bool,
    pub value: T,
}

type Slot<T, E> = watch::Receiver<Option<Result<T, E>>>;

struct Entry<T, E> {
    stale: bool,
    /// Identifies the fetch that produced (or is producing) this entry, so
    /// evictions and refresh completions never touch a successor entry.
    flight: u64,
    slot: Slot<T, E>,
}

struct Inner<T, E> {
    namespaces: Mutex<HashMap<String, HashMap<String, Entry<T, E>>>>,
    flights: AtomicU64,
}

/// A stale-while-revalidate cache over namespaced, canonicalized queries.
///
/// A miss stores the in-flight operation immediately, so concurrent
/// identical queries join one execution. A stale hit returns the previous
/// value at once, flips the entry fresh, and re-runs the operation in the
/// background. A failed operation is evicted rather than cached.
pub struct SwrCache<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for SwrCache<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

enum Action<T, E> {
    Hit(T),
    StaleHit { value: T, flight: u64 },
    Join(Slot<T, E>),
    Lead {
        tx: watch::Sender<Option<Result<T, E>>>,
        flight: u64,
    },
}

impl<T, E> SwrCache<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                namespaces: Mutex::new(HashMap::new()),
                flights: AtomicU64::new(0),
            }),
        }
    }

    /// Look up `query` under `namespace`, running `fetch` when needed.
    ///
    /// `fetch` is invoked at most once per call: inline on a miss, in the
    /// background on a stale hit, not at all otherwise.
    pub async fn get<Q, F, Fut>(
        &self,
        namespace: &str,
        query: &Q,
        fetch: F,
    ) -> Result<SwrHit<T>, QueryError<E>>
    where
        Q: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let key = canonical_query_key(query, &[QUERY_NAMESPACE_FIELD])
            .map_err(|e| QueryError::Key(e.to_string()))?;
        let mut fetch = Some(fetch);

        loop {
            let action = self.claim(namespace, &key);
            match action {
                Action::Hit(value) => return Ok(SwrHit { stale: false, value }),
                Action::StaleHit { value, flight } => {
                    let fetch = fetch.take().expect("fetch consumed twice");
                    self.spawn_refresh(namespace, &key, flight, fetch());
                    return Ok(SwrHit { stale: true, value });
                }
                Action::Join(mut slot) => loop {
                    if let Some(result) = slot.borrow_and_update().clone() {
                        return result
                            .map(|value| SwrHit { stale: false, value })
                            .map_err(QueryError::Operation);
                    }
                    if slot.changed().await.is_err() {
                        // The leader was dropped without publishing; contend
                        // for the slot again.
                        break;
                    }
                },
                Action::Lead { tx, flight } => {
                    let fetch = fetch.take().expect("fetch consumed twice");
                    let evict = EvictOnDrop {
                        inner: &self.inner,
                        namespace,
                        key: &key,
                        flight,
                        armed: true,
                    };
                    let result = fetch().await;
                    return match result {
                        Ok(value) => {
                            let _ = tx.send(Some(Ok(value.clone())));
                            evict.disarm();
                            Ok(SwrHit { stale: false, value })
                        }
                        Err(e) => {
                            let _ = tx.send(Some(Err(e.clone())));
                            drop(evict);
                            Err(QueryError::Operation(e))
                        }
                    };
                }
            }
        }
    }

    /// Whether a resolved result is cached for `query` under `namespace`.
    pub fn is_cached<Q: Serialize>(&self, namespace: &str, query: &Q) -> bool {
        let Ok(key) = canonical_query_key(query, &[QUERY_NAMESPACE_FIELD]) else {
            return false;
        };
        let namespaces = self.inner.namespaces.lock().unwrap();
        namespaces
            .get(namespace)
            .and_then(|ns| ns.get(&key))
            .is_some_and(|entry| matches!(&*entry.slot.borrow(), Some(Ok(_))))
    }

    /// Mark every entry under `namespace` stale. The next `get` for each
    /// query serves the old value instantly and refreshes in the
    /// background.
    pub fn mark_stale(&self, namespace: &str) {
        let mut namespaces = self.inner.namespaces.lock().unwrap();
        if let Some(ns) = namespaces.get_mut(namespace) {
            for entry in ns.values_mut() {
                entry.stale = true;
            }
        }
    }

    /// Drop every entry under `namespace`. In-flight operations already
    /// shared with callers run to completion; future callers re-fetch.
    pub fn invalidate(&self, namespace: &str) {
        self.inner.namespaces.lock().unwrap().remove(namespace);
    }

    /// Decide what this call does, under the cache lock.
    fn claim(&self, namespace: &str, key: &str) -> Action<T, E> {
        let mut namespaces = self.inner.namespaces.lock().unwrap();
        let ns = namespaces.entry(namespace.to_string()).or_default();

        if let Some(entry) = ns.get_mut(key) {
            let current = entry.slot.borrow().clone();
            match current {
                Some(Ok(value)) => {
                    return if entry.stale {
                        entry.stale = false;
                        Action::StaleHit {
                            value,
                            flight: entry.flight,
                        }
                    } else {
                        Action::Hit(value)
                    };
                }
                // A failed entry observed before its eviction: replace it.
                Some(Err(_)) => {}
                None => return Action::Join(entry.slot.clone()),
            }
        }

        let flight = self.inner.flights.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = watch::channel(None);
        ns.insert(
            key.to_string(),
            Entry {
                stale: false,
                flight,
                slot: rx,
            },
        );
        Action::Lead { tx, flight }
    }

    /// Re-run a query in the background after a stale hit. On success the
    /// entry is replaced with the refreshed value; on failure it is
    /// evicted.
    fn spawn_refresh<Fut>(&self, namespace: &str, key: &str, flight: u64, fut: Fut)
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let namespace = namespace.to_string();
        let key = key.to_string();
        tokio::spawn(async move {
            let result = fut.await;
            let mut namespaces = inner.namespaces.lock().unwrap();
            let Some(ns) = namespaces.get_mut(&namespace) else {
                return;
            };
            if ns.get(&key).map(|entry| entry.flight) != Some(flight) {
                // The entry was replaced while refreshing; leave it alone.
                return;
            }
            match result {
                Ok(value) => {
                    let (_tx, rx) = watch::channel(Some(Ok(value)));
                    ns.insert(
                        key,
                        Entry {
                            stale: false,
                            flight: inner.flights.fetch_add(1, Ordering::SeqCst),
                            slot: rx,
                        },
                    );
                }
                Err(_) => {
                    ns.remove(&key);
                }
            }
        });
    }
}

impl<T, E> Default for SwrCache<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Evicts an in-flight entry when its leader is dropped or fails, so a
/// later identical query retries instead of replaying a failure.
struct EvictOnDrop<'a, T, E> {
    inner: &'a Inner<T, E>,
    namespace: &'a str,
    key: &'a str,
    flight: u64,
    armed: bool,
}

impl<T, E> EvictOnDrop<'_, T, E> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<T, E> Drop for EvictOnDrop<'_, T, E> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut namespaces = self.inner.namespaces.lock().unwrap();
        if let Some(ns) = namespaces.get_mut(self.namespace) {
            if ns.get(self.key).map(|entry| entry.flight) == Some(self.flight) {
                ns.remove(self.key);
            }
        }
    }
}
