use std::time::{SystemTime, UNIX_EPOCH};

use crate::protocol::relay::ToolCall;

use super::{
    OpenAiAssistantMessage, OpenAiChatResponse, OpenAiChoice, OpenAiDelta, OpenAiStreamChoice,
    OpenAiStreamChunk, OpenAiToolCall, OpenAiToolCallFunction,
};

/// Identity fields shared by every chunk of one response.
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub id: String,
    pub model: String,
    pub created: u64,
}

impl ResponseMeta {
    /// Fresh random id; `model` falls back to `"relay"` when the request
    /// carried none.
    #[must_use]
    pub fn new(model: &str) -> Self {
        let id = uuid::Builder::from_random_bytes(fastrand::u128(..).to_le_bytes()).into_uuid();
        Self {
            id: format!("chatcmpl-{id}"),
            model: if model.is_empty() { "relay" } else { model }.to_string(),
            created: unix_now_secs(),
        }
    }
}

fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Encode one relay partial as a `chat.completion.chunk`.
///
/// Tool-call fragments are forwarded as received; continuation fragments keep
/// their empty id.
#[must_use]
pub fn encode_stream_chunk(meta: &ResponseMeta, text: &str, tool_calls: &[ToolCall]) -> OpenAiStreamChunk {
    OpenAiStreamChunk {
        id: meta.id.clone(),
        object: "chat.completion.chunk".to_string(),
        created: meta.created,
        model: meta.model.clone(),
        choices: vec![OpenAiStreamChoice {
            index: 0,
            delta: OpenAiDelta {
                role: "assistant".to_string(),
                content: text.to_string(),
                tool_calls: tool_calls.iter().map(forward_fragment).collect(),
            },
        }],
    }
}

fn forward_fragment(call: &ToolCall) -> OpenAiToolCall {
    OpenAiToolCall {
        id: call.id.clone(),
        type_: call.r#type.clone(),
        function: OpenAiToolCallFunction {
            name: call.name().to_string(),
            arguments: call.arguments().to_string(),
        },
    }
}

/// Encode the aggregated batch answer as a `chat.completion` document.
#[must_use]
pub fn encode_chat_response(
    meta: &ResponseMeta,
    content: String,
    tool_calls: Vec<OpenAiToolCall>,
) -> OpenAiChatResponse {
    let finish_reason = if tool_calls.is_empty() {
        "stop"
    } else {
        "tool_calls"
    };
    OpenAiChatResponse {
        id: meta.id.clone(),
        object: "chat.completion".to_string(),
        created: meta.created,
        model: meta.model.clone(),
        choices: vec![OpenAiChoice {
            index: 0,
            message: OpenAiAssistantMessage {
                role: "assistant".to_string(),
                content,
                tool_calls,
            },
            finish_reason: finish_reason.to_string(),
        }],
    }
}
