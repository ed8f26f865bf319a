//! Request correlator
//!
//! Mints a unique id for every outstanding request, remembers which waiter is
//! entitled to which id, and routes each inbound reply to exactly that one
//! waiter. Replies carry no cross-id ordering guarantee; within one id, at
//! most one outcome is ever delivered.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::envelope::{self, Decoded};
use crate::queue::OutboundQueue;
use crate::types::{Outcome, Result, UplinkError};

type PendingTable = Arc<DashMap<String, oneshot::Sender<Outcome>>>;

/// Correlates outbound requests with inbound replies
pub struct Correlator {
    pending: PendingTable,
    next_id: AtomicU64,
    queue: Arc<OutboundQueue>,
}

impl Correlator {
    pub fn new(queue: Arc<OutboundQueue>) -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            // Monotonic counter: ids never collide while pending, and tests
            // stay deterministic
            next_id: AtomicU64::new(0),
            queue,
        }
    }

    /// Submit a request. The envelope is encoded and enqueued immediately;
    /// the returned handle resolves once the matching reply arrives.
    pub fn submit(&self, method: &str, params: Vec<Value>) -> PendingReply {
        let id = self
            .next_id
            .fetch_add(1, Ordering::Relaxed)
            .wrapping_add(1)
            .to_string();

        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx);
        self.queue.enqueue(envelope::encode(&id, method, &params));
        debug!(%id, %method, "request submitted");

        PendingReply {
            id,
            rx,
            pending: Arc::clone(&self.pending),
        }
    }

    /// Classify one raw inbound frame and route it. Malformed frames are
    /// logged and dropped here; they never reach a waiter.
    pub fn receive(&self, text: &str) {
        match envelope::decode(text) {
            Decoded::Reply { id, outcome } => self.deliver(&id, outcome),
            Decoded::Malformed { reason } => warn!(%reason, "dropping malformed frame"),
        }
    }

    /// Deliver an outcome to the unique waiter for `id`, if one is still
    /// registered. An unknown id is dropped silently: it can legitimately
    /// occur after abandonment or across reconnect epochs.
    pub fn deliver(&self, id: &str, outcome: Outcome) {
        match self.pending.remove(id) {
            Some((_, waiter)) => {
                if waiter.send(outcome).is_err() {
                    debug!(%id, "waiter gone, reply discarded");
                }
            }
            None => debug!(%id, "no pending request for reply, dropping"),
        }
    }

    /// Number of requests still waiting for a reply
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// Handle for one outstanding request.
///
/// Await [`PendingReply::outcome`] for the reply. Dropping the handle
/// abandons the request: the waiter registration is removed and the eventual
/// reply, if any, is discarded. Nothing is cancelled on the wire.
#[derive(Debug)]
pub struct PendingReply {
    id: String,
    rx: oneshot::Receiver<Outcome>,
    pending: PendingTable,
}

impl PendingReply {
    /// Correlation id assigned to this request
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the one outcome of this request.
    ///
    /// May wait indefinitely if the backend never replies; a caller wanting a
    /// timeout races this against a timer and drops the handle on expiry.
    pub async fn outcome(mut self) -> Result<Outcome> {
        (&mut self.rx).await.map_err(|_| UplinkError::ChannelClosed)
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        // No-op when the reply was already delivered
        self.pending.remove(&self.id);
    }
}
