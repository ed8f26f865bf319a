//! Shared types: errors, outcomes, channel lifecycle states.

use serde_json::Value;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, UplinkError>;

/// Error types for uplink operations.
///
/// `Clone` so a single fetch outcome can be fanned out to every caller
/// attached to the same in-flight request.
#[derive(Debug, Clone, Error)]
pub enum UplinkError {
    /// The backend replied with a well-formed error frame. This is the only
    /// error category that originates on the remote side, and it is always
    /// surfaced to the caller.
    #[error("backend error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    /// The reply channel closed before an outcome arrived (client shutdown).
    #[error("reply channel closed before an outcome arrived")]
    ChannelClosed,

    /// An in-flight fetch this caller was attached to was dropped by its
    /// leader before completing. The next call for the key starts fresh.
    #[error("in-flight fetch interrupted before completing")]
    FetchInterrupted,
}

/// The error payload of a well-formed error frame
#[derive(Debug, Clone, PartialEq)]
pub struct RpcFailure {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

/// Tagged result of exactly one request, delivered at most once to exactly
/// one waiter.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Failure(RpcFailure),
}

impl Outcome {
    /// Unwrap into a `Result`, mapping a failure frame to
    /// [`UplinkError::Rpc`].
    pub fn into_result(self) -> Result<Value> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(failure) => Err(UplinkError::Rpc {
                code: failure.code,
                message: failure.message,
                data: failure.data,
            }),
        }
    }
}

/// Lifecycle state of the physical channel.
///
/// `Closed` is never terminal: a reconnection attempt is always scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Open,
    Closed,
}

impl LinkState {
    /// True whenever a user-visible "reconnecting" indicator should show.
    pub fn is_reconnecting(&self) -> bool {
        !matches!(self, LinkState::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_success_into_result() {
        let outcome = Outcome::Success(json!([1, 2, 3]));
        assert_eq!(outcome.into_result().unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn test_outcome_failure_into_result() {
        let outcome = Outcome::Failure(RpcFailure {
            code: 4003,
            message: "not logged in".into(),
            data: None,
        });
        match outcome.into_result() {
            Err(UplinkError::Rpc { code, message, .. }) => {
                assert_eq!(code, 4003);
                assert_eq!(message, "not logged in");
            }
            other => panic!("expected Rpc error, got {:?}", other),
        }
    }

    #[test]
    fn test_reconnecting_indicator() {
        assert!(LinkState::Connecting.is_reconnecting());
        assert!(LinkState::Closed.is_reconnecting());
        assert!(!LinkState::Open.is_reconnecting());
    }
}
