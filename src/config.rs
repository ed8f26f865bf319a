//! Configuration for the uplink client

use std::time::Duration;

/// Configuration for a [`Client`](crate::Client).
///
/// The endpoint is the one piece of required process configuration; the
/// timing knobs carry representative defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// WebSocket endpoint of the backend, e.g. `ws://127.0.0.1:8008/wsrpc`
    pub endpoint: String,

    /// First reconnect delay; the wait grows linearly with the retry count
    /// (default: 500 ms)
    pub base_delay: Duration,

    /// Upper bound on the reconnect delay (default: 10 s)
    pub max_delay: Duration,

    /// Optional validity window for cached results. `None` (the default)
    /// keeps entries until explicitly invalidated.
    pub cache_ttl: Option<Duration>,
}

impl Config {
    /// Create a config for `endpoint` with default timings.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            cache_ttl: None,
        }
    }
}
