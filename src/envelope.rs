//! Envelope codec
//!
//! Encodes outbound calls and classifies inbound frames. A frame that is not
//! a parseable, correctly-shaped reply comes back as [`Decoded::Malformed`]
//! so the connection loop can log and drop it; a bad frame must never tear
//! the channel down or reach a waiter.

use serde_json::{json, Value};

use crate::types::{Outcome, RpcFailure};

/// A classified inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A well-formed reply carrying the outcome for one correlation id
    Reply { id: String, outcome: Outcome },
    /// Anything else. Logged and dropped, never delivered.
    Malformed { reason: String },
}

/// Encode an outbound call envelope:
/// `{"id": <string>, "method": <string>, "params": <array>}`.
///
/// Infallible for well-formed inputs: the frame is built as a JSON value and
/// rendered through its `Display` impl.
pub fn encode(id: &str, method: &str, params: &[Value]) -> String {
    json!({ "id": id, "method": method, "params": params }).to_string()
}

/// Decode one inbound frame.
///
/// A success frame carries `result`, an error frame carries `error` with an
/// integer `code`, a string `message`, and optional `data`. `result` wins if
/// a frame somehow carries both.
pub fn decode(text: &str) -> Decoded {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => return malformed(format!("not valid JSON: {e}")),
    };

    let Some(frame) = value.as_object() else {
        return malformed("frame is not an object");
    };

    let Some(id) = frame.get("id").and_then(Value::as_str) else {
        return malformed("missing or non-string id");
    };
    let id = id.to_string();

    if let Some(result) = frame.get("result") {
        return Decoded::Reply {
            id,
            outcome: Outcome::Success(result.clone()),
        };
    }

    let Some(error) = frame.get("error").and_then(Value::as_object) else {
        return malformed("neither result nor error");
    };
    let Some(code) = error.get("code").and_then(Value::as_i64) else {
        return malformed("error frame without integer code");
    };
    let Some(message) = error.get("message").and_then(Value::as_str) else {
        return malformed("error frame without string message");
    };

    Decoded::Reply {
        id,
        outcome: Outcome::Failure(RpcFailure {
            code,
            message: message.to_string(),
            data: error.get("data").cloned(),
        }),
    }
}

fn malformed(reason: impl Into<String>) -> Decoded {
    Decoded::Malformed {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_outbound_shape() {
        let text = encode("7", "lib.search", &[json!("mqtt"), json!(1)]);
        let frame: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(frame["id"], json!("7"));
        assert_eq!(frame["method"], json!("lib.search"));
        assert_eq!(frame["params"], json!(["mqtt", 1]));
    }

    #[test]
    fn test_encode_empty_params() {
        let text = encode("1", "core.version", &[]);
        let frame: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(frame["params"], json!([]));
    }

    #[test]
    fn test_decode_success_frame() {
        let decoded = decode(r#"{"id":"7","result":[1,2,3]}"#);
        assert_eq!(
            decoded,
            Decoded::Reply {
                id: "7".into(),
                outcome: Outcome::Success(json!([1, 2, 3])),
            }
        );
    }

    #[test]
    fn test_decode_null_result_is_success() {
        // A null payload is still a reply, not a malformed frame
        let decoded = decode(r#"{"id":"3","result":null}"#);
        assert_eq!(
            decoded,
            Decoded::Reply {
                id: "3".into(),
                outcome: Outcome::Success(Value::Null),
            }
        );
    }

    #[test]
    fn test_decode_error_frame() {
        let decoded =
            decode(r#"{"id":"9","error":{"code":4003,"message":"not logged in","data":"x"}}"#);
        assert_eq!(
            decoded,
            Decoded::Reply {
                id: "9".into(),
                outcome: Outcome::Failure(RpcFailure {
                    code: 4003,
                    message: "not logged in".into(),
                    data: Some(json!("x")),
                }),
            }
        );
    }

    #[test]
    fn test_decode_error_without_data() {
        let decoded = decode(r#"{"id":"9","error":{"code":-1,"message":"boom"}}"#);
        match decoded {
            Decoded::Reply {
                outcome: Outcome::Failure(failure),
                ..
            } => assert_eq!(failure.data, None),
            other => panic!("expected failure reply, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_malformed_variants() {
        let cases = [
            "not json at all",
            "[1,2,3]",
            r#"{"result":42}"#,
            r#"{"id":42,"result":1}"#,
            r#"{"id":"7"}"#,
            r#"{"id":"7","error":{"message":"no code"}}"#,
            r#"{"id":"7","error":{"code":"NaN","message":"m"}}"#,
            r#"{"id":"7","error":"flat"}"#,
        ];
        for case in cases {
            assert!(
                matches!(decode(case), Decoded::Malformed { .. }),
                "should be malformed: {case}"
            );
        }
    }

    #[test]
    fn test_round_trip_id_survives() {
        let text = encode("42", "account.info", &[]);
        // Simulate the backend echoing the id back on a success frame
        let frame: Value = serde_json::from_str(&text).unwrap();
        let reply = format!(r#"{{"id":{},"result":"ok"}}"#, frame["id"]);
        match decode(&reply) {
            Decoded::Reply { id, .. } => assert_eq!(id, "42"),
            other => panic!("expected reply, got {:?}", other),
        }
    }
}
