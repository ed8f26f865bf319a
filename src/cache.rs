//! Single-flight cache gate
//!
//! The call discipline every feature area layers over the correlator: consult
//! the keyed result store first, attach to an in-flight fetch for the same
//! key instead of duplicating it, and only otherwise touch the network. The
//! in-flight check is the system's one mutual-exclusion rule; there is no
//! other lock between concurrent callers targeting the same key.
//!
//! Failed fetches are never stored, so a failure leaves the next caller free
//! to retry. Mutations that make a key stale call [`CacheGate::invalidate`]
//! (or [`CacheGate::invalidate_prefix`] for a key family); the gate provides
//! the primitive but never decides when to use it.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use crate::types::{Result, UplinkError};

/// One stored result plus its insertion time (for the optional TTL)
#[derive(Debug, Clone)]
struct CachedEntry {
    value: Value,
    stored_at: Instant,
}

/// Counters snapshot for one gate
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GateStats {
    /// Calls answered from the store without touching the network
    pub hits: u64,
    /// Calls that found neither a valid entry nor an in-flight fetch
    pub misses: u64,
    /// Calls that attached to an existing in-flight fetch
    pub coalesced: u64,
}

type FlightResult = Result<Value>;

enum Role {
    Leader(broadcast::Sender<FlightResult>),
    Follower(broadcast::Receiver<FlightResult>),
}

/// Keyed result store plus the single-flight discipline over it
pub struct CacheGate {
    store: DashMap<String, CachedEntry>,
    in_flight: DashMap<String, broadcast::Sender<FlightResult>>,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
}

impl CacheGate {
    /// Create a gate. `ttl: None` keeps entries valid until explicitly
    /// invalidated.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            store: DashMap::new(),
            in_flight: DashMap::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    /// Return the cached value for `key`, attach to an in-flight fetch for
    /// `key`, or run `fetcher` and store its success under `key`.
    pub async fn fetch_or_use<F, Fut>(&self, key: &str, fetcher: F) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        if let Some(value) = self.lookup(key) {
            return Ok(value);
        }

        let role = match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(entry) => Role::Follower(entry.get().subscribe()),
            Entry::Vacant(entry) => {
                let (tx, _) = broadcast::channel(1);
                entry.insert(tx.clone());
                Role::Leader(tx)
            }
        };

        match role {
            Role::Leader(tx) => self.lead(key, tx, fetcher).await,
            Role::Follower(mut rx) => {
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(key, "attached to in-flight fetch");
                match rx.recv().await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(UplinkError::FetchInterrupted),
                }
            }
        }
    }

    /// Run the fetch this caller leads and fan the outcome out to every
    /// attached follower.
    async fn lead<F, Fut>(
        &self,
        key: &str,
        tx: broadcast::Sender<FlightResult>,
        fetcher: F,
    ) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        // Removes the flight even if this future is dropped mid-fetch, so a
        // cancelled leader cannot wedge the key
        let flight = FlightGuard { gate: self, key };

        let outcome = fetcher().await;
        if let Ok(value) = &outcome {
            self.store.insert(
                key.to_string(),
                CachedEntry {
                    value: value.clone(),
                    stored_at: Instant::now(),
                },
            );
        }

        // Clear the flight before fan-out: a caller arriving now sees either
        // the stored value or, after a failure, a fresh retry slot
        drop(flight);
        let _ = tx.send(outcome.clone());
        outcome
    }

    /// Valid-entry lookup. Counts a hit or a miss; lazily drops an entry that
    /// outlived the TTL.
    fn lookup(&self, key: &str) -> Option<Value> {
        let (value, expired) = match self.store.get(key) {
            Some(entry) => match self.ttl {
                Some(ttl) if entry.stored_at.elapsed() > ttl => (None, true),
                _ => (Some(entry.value.clone()), false),
            },
            None => (None, false),
        };
        if expired {
            self.store.remove(key);
        }

        match value {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Remove one entry. Returns whether anything was removed; calling this
    /// for an absent key is a safe no-op.
    pub fn invalidate(&self, key: &str) -> bool {
        self.store.remove(key).is_some()
    }

    /// Remove every entry whose key starts with `prefix`. Returns the number
    /// removed.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let before = self.store.len();
        self.store.retain(|key, _| !key.starts_with(prefix));
        before - self.store.len()
    }

    /// Drop all entries
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Counters snapshot
    pub fn stats(&self) -> GateStats {
        GateStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
        }
    }
}

struct FlightGuard<'a> {
    gate: &'a CacheGate,
    key: &'a str,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.gate.in_flight.remove(self.key);
    }
}
