//! Single-flight joining of concurrent async operations.
//!
//! [`Inflight`] ensures that concurrent calls with an equal key execute the
//! underlying operation only once. The first caller becomes the leader and
//! runs the operation; callers arriving while it is pending wait for the
//! leader's result and receive a clone of it.
//!
//! If a leader is dropped before publishing a result (task cancellation),
//! one of the waiting callers is promoted and re-runs the operation, so
//! waiters never hang on an abandoned slot.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Mutex;

use tokio::sync::watch;

type Slot<V, E> = watch::Receiver<Option<Result<V, E>>>;

/// Single-flight join map for concurrent async operations.
///
/// Keys identify logically identical operations; while one is pending, calls
/// with an equal key share its outcome instead of running their own.
pub struct Inflight<K, V, E> {
    pending: Mutex<HashMap<K, Slot<V, E>>>,
}

impl<K, V, E> Inflight<K, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone,
    E: Clone,
{
    /// Create a new `Inflight` map with no pending operations.
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Execute `f` under single-flight control for `key`.
    ///
    /// If no operation with this key is pending, `f` is invoked and its
    /// result published to any callers that arrive in the meantime. If an
    /// operation with this key is already pending, the call waits for that
    /// operation and returns a clone of its result.
    ///
    /// `f` may be invoked more than once across retries if a pending leader
    /// is dropped before completing, which is why it is `Fn` and not
    /// `FnOnce`.
    pub async fn run<F, Fut>(&self, key: K, f: F) -> Result<V, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        enum Role<V, E> {
            Lead(watch::Sender<Option<Result<V, E>>>),
            Follow(Slot<V, E>),
        }

        loop {
            let role = {
                let mut pending = self.pending.lock().unwrap();
                match pending.get(&key) {
                    Some(rx) => Role::Follow(rx.clone()),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        pending.insert(key.clone(), rx);
                        Role::Lead(tx)
                    }
                }
            };

            let mut slot = match role {
                Role::Lead(tx) => return self.lead(&key, tx, f()).await,
                Role::Follow(slot) => slot,
            };

            loop {
                if let Some(result) = slot.borrow_and_update().clone() {
                    return result;
                }
                if slot.changed().await.is_err() {
                    // The leader was dropped without publishing; go back and
                    // contend for leadership.
                    break;
                }
            }
        }
    }

    /// Run the operation as leader, publish the result, and clear the slot.
    async fn lead<Fut>(
        &self,
        key: &K,
        tx: watch::Sender<Option<Result<V, E>>>,
        fut: Fut,
    ) -> Result<V, E>
    where
        Fut: Future<Output = Result<V, E>>,
    {
        let cleanup = ClearSlot {
            pending: &self.pending,
            key,
        };
        let result = fut.await;
        let _ = tx.send(Some(result.clone()));
        drop(cleanup);
        result
    }

    /// Returns the number of operations currently pending.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

impl<K, V, E> Default for Inflight<K, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone,
    E: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Removes a pending slot when dropped, whether the leader finished or was
/// cancelled mid-operation.
struct ClearSlot<'a, K: Hash + Eq, V, E> {
    pending: &'a Mutex<HashMap<K, Slot<V, E>>>,
    key: &'a K,
}

impl<K: Hash + Eq, V, E> Drop for ClearSlot<'_, K, V, E> {
    fn drop(&mut self) {
        self.pending.lock().unwrap().remove(self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_single_call() {
        let inflight: Inflight<&'static str, u32, ()> = Inflight::new();

        let result = inflight.run("key", || async { Ok(7) }).await;

        assert_eq!(result, Ok(7));
        assert_eq!(inflight.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_error_result() {
        let inflight: Inflight<&'static str, u32, String> = Inflight::new();

        let result = inflight
            .run("key", || async { Err("boom".to_string()) })
            .await;

        assert_eq!(result, Err("boom".to_string()));
        assert_eq!(inflight.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_same_key_runs_once() {
        let inflight: Arc<Inflight<String, u32, ()>> = Arc::new(Inflight::new());
        let runs = Arc::new(AtomicU32::new(0));

        let mut handles = vec![];
        for _ in 0..5 {
            let inflight = Arc::clone(&inflight);
            let runs = Arc::clone(&runs);
            handles.push(tokio::spawn(async move {
                inflight
                    .run("same".to_string(), || {
                        let runs = Arc::clone(&runs);
                        async move {
                            runs.fetch_add(1, Ordering::SeqCst);
                            sleep(Duration::from_millis(50)).await;
                            Ok(11)
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(11));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(inflight.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_run_independently() {
        let inflight: Arc<Inflight<String, u32, ()>> = Arc::new(Inflight::new());
        let runs = Arc::new(AtomicU32::new(0));

        let mut handles = vec![];
        for i in 0..4 {
            let inflight = Arc::clone(&inflight);
            let runs = Arc::clone(&runs);
            handles.push(tokio::spawn(async move {
                inflight
                    .run(format!("key-{i}"), || {
                        let runs = Arc::clone(&runs);
                        async move {
                            runs.fetch_add(1, Ordering::SeqCst);
                            sleep(Duration::from_millis(20)).await;
                            Ok(0)
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(runs.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_sequential_calls_both_run() {
        let inflight: Inflight<&'static str, u32, ()> = Inflight::new();
        let runs = Arc::new(AtomicU32::new(0));

        for expected in [1, 2] {
            let result = inflight
                .run("key", || {
                    let runs = Arc::clone(&runs);
                    async move { Ok(runs.fetch_add(1, Ordering::SeqCst) + 1) }
                })
                .await;
            assert_eq!(result, Ok(expected));
        }
    }

    #[tokio::test]
    async fn test_dropped_leader_promotes_waiter() {
        let inflight: Arc<Inflight<String, u32, ()>> = Arc::new(Inflight::new());
        let runs = Arc::new(AtomicU32::new(0));

        // Leader that never completes.
        let leader = {
            let inflight = Arc::clone(&inflight);
            let runs = Arc::clone(&runs);
            tokio::spawn(async move {
                inflight
                    .run("key".to_string(), || {
                        let runs = Arc::clone(&runs);
                        async move {
                            runs.fetch_add(1, Ordering::SeqCst);
                            sleep(Duration::from_secs(3600)).await;
                            Ok(0)
                        }
                    })
                    .await
            })
        };

        // Let the leader claim the slot, then attach a waiter and abort the
        // leader.
        sleep(Duration::from_millis(20)).await;
        let waiter = {
            let inflight = Arc::clone(&inflight);
            let runs = Arc::clone(&runs);
            tokio::spawn(async move {
                inflight
                    .run("key".to_string(), || {
                        let runs = Arc::clone(&runs);
                        async move {
                            runs.fetch_add(1, Ordering::SeqCst);
                            Ok(42)
                        }
                    })
                    .await
            })
        };
        sleep(Duration::from_millis(20)).await;
        leader.abort();

        assert_eq!(waiter.await.unwrap(), Ok(42));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(inflight.pending_count(), 0);
    }
}
