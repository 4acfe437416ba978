//! SSE wire encoding for the `OpenAI` streaming format.

use bytes::Bytes;
use serde::Serialize;

use crate::error::BridgeError;
use crate::protocol::error_shapes::openai_stream_error_payload;

const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Format a `[DONE]` frame as SSE text.
#[must_use]
pub fn done_frame() -> String {
    DONE_FRAME.to_owned()
}

/// Format an OpenAI-style SSE frame (no event type, just data).
#[must_use]
pub fn openai_sse_frame(json: &str) -> String {
    let mut out = String::with_capacity(10 + json.len());
    out.push_str("data: ");
    out.push_str(json);
    out.push_str("\n\n");
    out
}

/// Serialize `value` and wrap it in a data frame.
///
/// # Errors
///
/// Returns [`BridgeError::Internal`] when `value` cannot be serialized.
pub fn json_sse_frame<T: Serialize>(value: &T) -> Result<Bytes, BridgeError> {
    let json = serde_json::to_string(value)
        .map_err(|e| BridgeError::Internal(format!("failed to encode SSE payload: {e}")))?;
    Ok(Bytes::from(openai_sse_frame(&json)))
}

/// Error event for a stream whose `200` status line has already been sent.
#[must_use]
pub fn error_sse_frame(err: &BridgeError) -> Bytes {
    let payload = openai_stream_error_payload(err.status(), &err.to_string());
    Bytes::from(openai_sse_frame(&payload.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_done_frame_string() {
        assert_eq!(done_frame(), "data: [DONE]\n\n");
    }

    #[test]
    fn test_openai_sse_frame_helper() {
        let json = r#"{"id":"chatcmpl-1"}"#;
        assert_eq!(openai_sse_frame(json), "data: {\"id\":\"chatcmpl-1\"}\n\n");
    }

    #[test]
    fn test_json_sse_frame_serializes_value() {
        let frame = json_sse_frame(&serde_json::json!({"a": 1})).expect("frame");
        assert_eq!(frame, Bytes::from_static(b"data: {\"a\":1}\n\n"));
    }

    #[test]
    fn test_error_frame_carries_relay_message_and_code() {
        let frame = error_sse_frame(&BridgeError::Relay("model overloaded".to_string()));
        let text = std::str::from_utf8(&frame).expect("utf8");
        let json: serde_json::Value = serde_json::from_str(
            text.strip_prefix("data: ")
                .and_then(|t| t.strip_suffix("\n\n"))
                .expect("data frame"),
        )
        .expect("json");
        assert_eq!(json["error"]["message"], "model overloaded");
        assert_eq!(json["error"]["code"], 500);
    }
}
