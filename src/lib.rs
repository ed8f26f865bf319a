//! Uplink - persistent JSON-RPC client core
//!
//! Keeps one logical request/response channel to a long-running backend alive
//! across physical reconnect cycles. Callers get a simple "ask once, get
//! exactly one answer" contract; underneath, outbound work queues while the
//! socket is down, replies arrive in any order and are routed back to the one
//! waiter that asked, and every close schedules another connection attempt.
//!
//! ## Components
//!
//! - **Envelope codec** ([`envelope`]): textual JSON-RPC-shaped frames;
//!   anything malformed is classified, logged, and dropped
//! - **Connection manager** (internal): socket lifecycle and capped
//!   reconnect backoff
//! - **Outbound queue** ([`queue`]): FIFO buffering while disconnected,
//!   flushed exactly once per item when the channel opens
//! - **Request correlator** ([`correlator`]): id minting and reply routing
//! - **Cache gate** ([`cache`]): single-flight, cache-checked call discipline
//! - **Client** ([`client`]): the facade feature areas talk to
//!
//! ## Example
//!
//! ```ignore
//! let client = Client::connect(Config::new("ws://127.0.0.1:8008/wsrpc"));
//! let hits = client.cached_call("lib.search:mqtt", "lib.search", vec![json!("mqtt")]).await?;
//! client.invalidate_prefix("lib.search:");
//! ```

pub mod cache;
pub mod client;
pub mod config;
mod connection;
pub mod correlator;
pub mod envelope;
pub mod queue;
pub mod types;

pub use cache::{CacheGate, GateStats};
pub use client::Client;
pub use config::Config;
pub use correlator::{Correlator, PendingReply};
pub use envelope::{decode, encode, Decoded};
pub use queue::OutboundQueue;
pub use types::{LinkState, Outcome, Result, RpcFailure, UplinkError};
