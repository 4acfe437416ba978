use bytes::Buf;
use prost::Message;

use super::{Envelope, Payload};
use crate::error::BridgeError;

const PAYLOAD_TAGS: std::ops::RangeInclusive<u64> = 1..=6;

#[must_use]
pub fn encode_envelope(envelope: &Envelope) -> Vec<u8> {
    envelope.encode_to_vec()
}

#[must_use]
pub fn encode_payload(payload: Payload) -> Vec<u8> {
    encode_envelope(&Envelope {
        payload: Some(payload),
    })
}

/// Decode one envelope and return its single active variant.
///
/// # Errors
///
/// Returns [`BridgeError::Codec`] when the bytes are not a valid envelope,
/// when no known variant is populated, or when more than one distinct
/// variant is populated.
pub fn decode_envelope(bytes: &[u8]) -> Result<Payload, BridgeError> {
    let populated = count_populated_variants(bytes)?;
    if populated > 1 {
        return Err(BridgeError::Codec(format!(
            "envelope populates {populated} variants, expected exactly one"
        )));
    }

    let envelope = Envelope::decode(bytes)
        .map_err(|e| BridgeError::Codec(format!("invalid envelope: {e}")))?;
    envelope
        .payload
        .ok_or_else(|| BridgeError::Codec("envelope carries no recognized variant".to_string()))
}

// prost merges repeated oneof fields with last-wins semantics, so the number of
// distinct variants present on the wire has to be counted before decoding.
fn count_populated_variants(mut buf: &[u8]) -> Result<usize, BridgeError> {
    let mut seen = [false; 7];
    while buf.has_remaining() {
        let key = read_varint(&mut buf)?;
        let tag = key >> 3;
        match key & 0x7 {
            0 => {
                read_varint(&mut buf)?;
            }
            1 => skip(&mut buf, 8)?,
            2 => {
                let len = usize::try_from(read_varint(&mut buf)?)
                    .map_err(|_| BridgeError::Codec("field length overflow".to_string()))?;
                skip(&mut buf, len)?;
            }
            5 => skip(&mut buf, 4)?,
            other => {
                return Err(BridgeError::Codec(format!(
                    "unsupported wire type {other} for field {tag}"
                )));
            }
        }
        if PAYLOAD_TAGS.contains(&tag) {
            if let Ok(index) = usize::try_from(tag) {
                seen[index] = true;
            }
        }
    }
    Ok(seen.iter().filter(|present| **present).count())
}

fn read_varint(buf: &mut &[u8]) -> Result<u64, BridgeError> {
    prost::encoding::decode_varint(buf)
        .map_err(|e| BridgeError::Codec(format!("invalid envelope: {e}")))
}

fn skip(buf: &mut &[u8], len: usize) -> Result<(), BridgeError> {
    if buf.remaining() < len {
        return Err(BridgeError::Codec("truncated envelope".to_string()));
    }
    buf.advance(len);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::relay::{
        ChatCompletionComplete, ChatCompletionPartial, RegisterClientResponse, RelayError,
        ToolCall, ToolCallFunction,
    };

    #[test]
    fn test_partial_with_tool_call_decodes() {
        let bytes = encode_payload(Payload::ChatCompletionPartial(ChatCompletionPartial {
            message: "hel".to_string(),
            tool_calls: vec![ToolCall {
                id: "call_1".to_string(),
                r#type: "function".to_string(),
                function: Some(ToolCallFunction {
                    name: "get_weather".to_string(),
                    arguments: "{\"city\":".to_string(),
                }),
            }],
        }));

        let Payload::ChatCompletionPartial(partial) = decode_envelope(&bytes).unwrap() else {
            panic!("expected partial");
        };
        assert_eq!(partial.message, "hel");
        assert_eq!(partial.tool_calls[0].name(), "get_weather");
        assert_eq!(partial.tool_calls[0].arguments(), "{\"city\":");
    }

    #[test]
    fn test_empty_envelope_is_rejected() {
        let bytes = encode_envelope(&Envelope { payload: None });
        let err = decode_envelope(&bytes).unwrap_err();
        assert!(matches!(err, BridgeError::Codec(_)));
    }

    #[test]
    fn test_unknown_variant_only_is_rejected() {
        // field 9, wire type 2, length 0
        let err = decode_envelope(&[0x4a, 0x00]).unwrap_err();
        assert!(err.to_string().contains("no recognized variant"));
    }

    #[test]
    fn test_two_variants_are_rejected() {
        let mut bytes = encode_payload(Payload::RelayError(RelayError {
            message: "boom".to_string(),
        }));
        bytes.extend(encode_payload(Payload::ChatCompletionComplete(
            ChatCompletionComplete { invoice: None },
        )));
        let err = decode_envelope(&bytes).unwrap_err();
        assert!(err.to_string().contains("2 variants"));
    }

    #[test]
    fn test_repeated_same_variant_merges() {
        let mut bytes = encode_payload(Payload::RegisterClientResponse(RegisterClientResponse {
            ok: true,
            message: String::new(),
            invoice: None,
        }));
        bytes.extend(encode_payload(Payload::RegisterClientResponse(
            RegisterClientResponse {
                ok: true,
                message: "welcome".to_string(),
                invoice: None,
            },
        )));
        let Payload::RegisterClientResponse(resp) = decode_envelope(&bytes).unwrap() else {
            panic!("expected register response");
        };
        assert_eq!(resp.message, "welcome");
    }

    #[test]
    fn test_truncated_bytes_are_rejected() {
        let bytes = encode_payload(Payload::RelayError(RelayError {
            message: "boom".to_string(),
        }));
        let err = decode_envelope(&bytes[..bytes.len() - 2]).unwrap_err();
        assert!(matches!(err, BridgeError::Codec(_)));
    }
}
