// src/storage/cache.rs

//! In-memory TTL cache with single-flight refresh.
//!
//! Readers of a fresh entry only take a read lock. A miss registers one
//! refresh per key; every caller arriving while it runs awaits the same
//! shared result. Refreshes run on their own task so a caller going away
//! does not cancel the upstream scrape.
//!
//! Lock order is `in_flight` then `entries`, everywhere.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;

use crate::error::{AppError, Result};
use crate::models::CacheConfig;

type Outcome<T> = std::result::Result<Arc<T>, Arc<AppError>>;
type Refresh<T> = Shared<BoxFuture<'static, Outcome<T>>>;

/// A cached payload and when it was fetched.
#[derive(Debug)]
pub struct CacheEntry<T> {
    pub payload: Arc<T>,
    pub fetched_at: Instant,
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    /// Fresh until `ttl` has fully elapsed.
    pub fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) <= self.ttl
    }
}

struct InFlight<T> {
    id: u64,
    refresh: Refresh<T>,
}

struct CacheState<T> {
    entries: RwLock<HashMap<String, CacheEntry<T>>>,
    in_flight: Mutex<HashMap<String, InFlight<T>>>,
    next_flight: AtomicU64,
}

/// Keyed payload cache shared by all request handlers.
pub struct CacheManager<T> {
    ttl: Duration,
    serve_stale_on_error: bool,
    state: Arc<CacheState<T>>,
}

impl<T> Clone for CacheManager<T> {
    fn clone(&self) -> Self {
        Self {
            ttl: self.ttl,
            serve_stale_on_error: self.serve_stale_on_error,
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Send + Sync + 'static> CacheManager<T> {
    pub fn new(ttl: Duration, serve_stale_on_error: bool) -> Self {
        Self {
            ttl,
            serve_stale_on_error,
            state: Arc::new(CacheState {
                entries: RwLock::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                next_flight: AtomicU64::new(0),
            }),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl(), config.serve_stale_on_error)
    }

    /// Fresh payload for `key`, if any.
    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        let entries = read(&self.state.entries);
        entries
            .get(key)
            .filter(|entry| entry.is_fresh(Instant::now()))
            .map(|entry| Arc::clone(&entry.payload))
    }

    /// Fresh payload for `key`, refreshing it with `refresh` on a miss.
    ///
    /// `refresh` is only called when no other refresh of `key` is running.
    /// A failed refresh leaves the cache untouched; with stale serving
    /// enabled the expired payload is returned instead of the error.
    pub async fn get_or_refresh<F, Fut>(&self, key: &str, refresh: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if let Some(payload) = self.get(key) {
            log::debug!("cache hit for {key}");
            return Ok(payload);
        }

        let flight = {
            let mut in_flight = lock(&self.state.in_flight);
            match in_flight.get(key) {
                Some(running) => {
                    log::debug!("joining running refresh of {key}");
                    running.refresh.clone()
                }
                None => {
                    // A refresh may have finished since the first check.
                    if let Some(payload) = self.get(key) {
                        return Ok(payload);
                    }
                    log::info!("cache miss for {key}, refreshing");
                    let id = self.state.next_flight.fetch_add(1, Ordering::Relaxed);
                    let shared = self.spawn_refresh(key, id, refresh());
                    in_flight.insert(
                        key.to_string(),
                        InFlight {
                            id,
                            refresh: shared.clone(),
                        },
                    );
                    shared
                }
            }
        };

        match flight.await {
            Ok(payload) => Ok(payload),
            Err(error) => self.fallback(key, &error),
        }
    }

    /// Drop one key. Returns whether anything was cached or running for it.
    pub fn clear_key(&self, key: &str) -> bool {
        let mut in_flight = lock(&self.state.in_flight);
        let running = in_flight.remove(key).is_some();
        let cached = write(&self.state.entries).remove(key).is_some();
        running || cached
    }

    /// Drop every key. Returns the number of entries removed.
    ///
    /// Refreshes already running still answer their callers but no longer
    /// populate the cache.
    pub fn clear_all(&self) -> usize {
        let mut in_flight = lock(&self.state.in_flight);
        in_flight.clear();
        let mut entries = write(&self.state.entries);
        let removed = entries.len();
        entries.clear();
        log::info!("cache cleared ({removed} entries)");
        removed
    }

    pub fn len(&self) -> usize {
        read(&self.state.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn spawn_refresh<Fut>(&self, key: &str, id: u64, work: Fut) -> Refresh<T>
    where
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let ttl = self.ttl;
        let owned_key = key.to_string();
        let handle = tokio::spawn(async move {
            let outcome: Outcome<T> = work.await.map(Arc::new).map_err(Arc::new);
            let mut in_flight = lock(&state.in_flight);
            if in_flight.get(&owned_key).is_some_and(|f| f.id == id) {
                in_flight.remove(&owned_key);
                if let Ok(payload) = &outcome {
                    write(&state.entries).insert(
                        owned_key,
                        CacheEntry {
                            payload: Arc::clone(payload),
                            fetched_at: Instant::now(),
                            ttl,
                        },
                    );
                }
            }
            outcome
        });

        let state = Arc::clone(&self.state);
        let key = key.to_string();
        async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    let mut in_flight = lock(&state.in_flight);
                    if in_flight.get(&key).is_some_and(|f| f.id == id) {
                        in_flight.remove(&key);
                    }
                    Err(Arc::new(AppError::refresh(key, join_error)))
                }
            }
        }
        .boxed()
        .shared()
    }

    fn fallback(&self, key: &str, error: &AppError) -> Result<Arc<T>> {
        if self.serve_stale_on_error {
            if let Some(entry) = read(&self.state.entries).get(key) {
                log::warn!("refresh of {key} failed, serving stale payload: {error}");
                return Ok(Arc::clone(&entry.payload));
            }
        }
        log::warn!("refresh of {key} failed: {error}");
        Err(AppError::refresh(key, error))
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<V>(lock: &RwLock<V>) -> RwLockReadGuard<'_, V> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<V>(lock: &RwLock<V>) -> RwLockWriteGuard<'_, V> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
