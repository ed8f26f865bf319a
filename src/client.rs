//! Client facade
//!
//! The two entry points every feature area builds on: [`Client::call`]
//! (submit one request, get exactly one outcome) and [`Client::cached_call`]
//! (the same behind the single-flight cache gate), plus the invalidation
//! primitive mutations use to mark keys stale.
//!
//! One `Client` owns one logical channel for the process lifetime. It is an
//! explicitly constructed object, not an ambient global, so tests can run
//! many independent instances side by side.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::cache::{CacheGate, GateStats};
use crate::config::Config;
use crate::connection::connection_loop;
use crate::correlator::{Correlator, PendingReply};
use crate::queue::OutboundQueue;
use crate::types::{LinkState, Result};

/// Handle to one logical uplink channel
pub struct Client {
    correlator: Arc<Correlator>,
    cache: Arc<CacheGate>,
    state: watch::Receiver<LinkState>,
    worker: JoinHandle<()>,
}

impl Client {
    /// Spawn the connection task and return immediately. Must be called from
    /// within a Tokio runtime. Requests submitted before the channel opens
    /// are queued and flushed, in order, once it does.
    pub fn connect(config: Config) -> Self {
        let queue = Arc::new(OutboundQueue::new());
        let correlator = Arc::new(Correlator::new(Arc::clone(&queue)));
        let cache = Arc::new(CacheGate::new(config.cache_ttl));
        let (state_tx, state_rx) = watch::channel(LinkState::Connecting);

        info!(endpoint = %config.endpoint, "uplink client starting");
        let worker = tokio::spawn(connection_loop(
            config,
            queue,
            Arc::clone(&correlator),
            state_tx,
        ));

        Self {
            correlator,
            cache,
            state: state_rx,
            worker,
        }
    }

    /// Submit a request and keep the raw handle. For callers that want their
    /// own timeout: race [`PendingReply::outcome`] against a timer and drop
    /// the handle on expiry.
    pub fn submit(&self, method: &str, params: Vec<Value>) -> PendingReply {
        self.correlator.submit(method, params)
    }

    /// Submit a request and wait for its one outcome. A well-formed error
    /// frame surfaces as [`UplinkError::Rpc`](crate::UplinkError::Rpc);
    /// transport trouble never does — the request simply stays pending until
    /// a reply arrives after reconnect.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        self.submit(method, params).outcome().await?.into_result()
    }

    /// [`Client::call`] behind the single-flight cache gate: a valid cached
    /// result for `key` skips the network, a concurrent call for `key`
    /// attaches to the in-flight one.
    pub async fn cached_call(&self, key: &str, method: &str, params: Vec<Value>) -> Result<Value> {
        self.cache
            .fetch_or_use(key, || self.call(method, params))
            .await
    }

    /// Direct access to the cache gate, for callers with custom fetchers
    pub fn cache(&self) -> &CacheGate {
        &self.cache
    }

    /// Drop one cached entry. Safe no-op when absent.
    pub fn invalidate(&self, key: &str) -> bool {
        self.cache.invalidate(key)
    }

    /// Drop every cached entry whose key starts with `prefix`
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        self.cache.invalidate_prefix(prefix)
    }

    /// Watch the channel lifecycle. Drives the UI's reconnecting indicator:
    /// shown while [`LinkState::is_reconnecting`], dismissed on open.
    pub fn link_state(&self) -> watch::Receiver<LinkState> {
        self.state.clone()
    }

    /// Whether the physical channel is currently open
    pub fn is_open(&self) -> bool {
        *self.state.borrow() == LinkState::Open
    }

    /// Number of requests still waiting for a reply
    pub fn pending_count(&self) -> usize {
        self.correlator.pending_count()
    }

    /// Cache gate counters
    pub fn gate_stats(&self) -> GateStats {
        self.cache.stats()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.worker.abort();
    }
}
