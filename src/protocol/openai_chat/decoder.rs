use bytes::Bytes;
use serde_json::Value;

use crate::error::BridgeError;
use crate::protocol::relay::{
    chat_message, content_part, ChatCompletionRequest, ChatMessage, ContentPart, ImageUrl,
    MultiPartContent, TextPart, Tool, ToolFunction,
};
use crate::routing::selector::{parse_selector, validate_tier_selector};

use super::{OpenAiChatRequest, OpenAiMessage, OpenAiTool};

pub const DEFAULT_MAX_TOKENS: u32 = 10_000;
pub const DEFAULT_TEMPERATURE: f32 = 0.5;
/// Request ids stay inside the range a JSON number represents exactly.
const REQUEST_ID_LIMIT: u64 = 1 << 53;

/// A relay chat request plus the HTTP-side details needed to answer it.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedRequest {
    pub request: ChatCompletionRequest,
    pub stream: bool,
    /// Raw `model` string, echoed back in responses.
    pub model: String,
}

/// Translate an `OpenAI` Chat Completions body into a relay chat request.
///
/// # Errors
///
/// - [`BridgeError::MissingBody`] when the body is empty.
/// - [`BridgeError::InvalidRequest`] when the body is not a chat request.
/// - [`BridgeError::InvalidSelector`] / [`BridgeError::InvalidTierSelector`]
///   when the `model` selector is malformed.
pub fn translate_chat_request(body: &Bytes) -> Result<TranslatedRequest, BridgeError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(BridgeError::MissingBody);
    }
    let request: OpenAiChatRequest = serde_json::from_slice(body)
        .map_err(|e| BridgeError::InvalidRequest(format!("invalid chat request body: {e}")))?;
    translate_openai_chat_request(request)
}

/// Translate an already-parsed chat request.
///
/// # Errors
///
/// See [`translate_chat_request`].
pub fn translate_openai_chat_request(
    request: OpenAiChatRequest,
) -> Result<TranslatedRequest, BridgeError> {
    let OpenAiChatRequest {
        model,
        messages,
        tools,
        stream,
        temperature,
        max_tokens,
        extra: _,
    } = request;

    let selector = parse_selector(model.as_deref())?;
    if !validate_tier_selector(&selector.tier_selector) {
        return Err(BridgeError::InvalidTierSelector(selector.tier_selector));
    }
    tracing::debug!(
        tier_selector = %selector.tier_selector,
        flags = ?selector.flags,
        "parsed model selector"
    );

    let messages = messages
        .into_iter()
        .map(translate_message)
        .collect::<Result<Vec<_>, _>>()?;
    let tools = tools
        .unwrap_or_default()
        .into_iter()
        .map(translate_tool)
        .collect::<Result<Vec<_>, _>>()?;

    #[allow(clippy::cast_possible_truncation)]
    let temperature = temperature.map_or(DEFAULT_TEMPERATURE, |t| t as f32);
    let request = ChatCompletionRequest {
        request_id: fastrand::u64(..REQUEST_ID_LIMIT),
        messages,
        tools,
        tier_selector: selector.tier_selector.clone(),
        max_tokens: max_tokens.map_or(DEFAULT_MAX_TOKENS, |v| {
            u32::try_from(v).unwrap_or(u32::MAX)
        }),
        temperature,
        flags: selector
            .feature_flags()
            .into_iter()
            .map(i32::from)
            .collect(),
    };

    Ok(TranslatedRequest {
        request,
        stream: stream.unwrap_or(false),
        model: model.unwrap_or_default(),
    })
}

fn translate_message(message: OpenAiMessage) -> Result<ChatMessage, BridgeError> {
    let content = match message.content {
        None | Some(Value::Null) => chat_message::Content::Text(String::new()),
        Some(Value::String(text)) => chat_message::Content::Text(text),
        Some(Value::Array(parts)) => chat_message::Content::Multi(MultiPartContent {
            parts: parts.into_iter().filter_map(translate_part).collect(),
        }),
        Some(_) => {
            return Err(BridgeError::InvalidRequest(format!(
                "content of '{}' message must be a string, an array of parts, or null",
                message.role
            )));
        }
    };
    Ok(ChatMessage {
        role: message.role,
        content: Some(content),
    })
}

/// Unknown part types are dropped.
fn translate_part(part: Value) -> Option<ContentPart> {
    let part = match part.get("type").and_then(Value::as_str)? {
        "text" => content_part::Part::Text(TextPart {
            text: string_field(&part, "text"),
        }),
        "image_url" => {
            let image = part.get("image_url");
            let (url, detail) = match image {
                Some(Value::String(url)) => (url.clone(), String::new()),
                Some(image) => (string_field(image, "url"), string_field(image, "detail")),
                None => (String::new(), String::new()),
            };
            content_part::Part::ImageUrl(ImageUrl { url, detail })
        }
        other => {
            tracing::debug!(part_type = other, "dropping unsupported content part");
            return None;
        }
    };
    Some(ContentPart { part: Some(part) })
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn translate_tool(tool: OpenAiTool) -> Result<Tool, BridgeError> {
    let parameters = match tool.function.parameters {
        None | Some(Value::Null) => "{}".to_string(),
        Some(parameters) => serde_json::to_string(&parameters).map_err(|e| {
            BridgeError::InvalidRequest(format!(
                "parameters of tool '{}' cannot be serialized: {e}",
                tool.function.name
            ))
        })?,
    };
    Ok(Tool {
        r#type: tool.type_,
        function: Some(ToolFunction {
            name: tool.function.name,
            description: tool.function.description.unwrap_or_default(),
            parameters,
        }),
    })
}
