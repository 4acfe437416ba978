//! Relay wire messages.
//!
//! Every WebSocket binary message exchanged with the relay carries exactly one
//! protobuf-encoded [`Envelope`]. The message types below are written with the
//! `prost` derives directly instead of being generated from a `.proto` file:
//!
//! ```text
//! message Envelope {
//!   oneof payload {
//!     RegisterClientRequest  register_client_request  = 1;
//!     RegisterClientResponse register_client_response = 2;
//!     ChatCompletionRequest  chat_completion_request  = 3;
//!     ChatCompletionPartial  chat_completion_partial  = 4;
//!     ChatCompletionComplete chat_completion_complete = 5;
//!     RelayError             relay_error              = 6;
//!   }
//! }
//! ```

pub mod codec;

pub use codec::{decode_envelope, encode_envelope, encode_payload};
pub use envelope::Payload;

/// Outermost tagged-union message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Envelope {
    #[prost(oneof = "envelope::Payload", tags = "1, 2, 3, 4, 5, 6")]
    pub payload: Option<envelope::Payload>,
}

pub mod envelope {
    /// The active envelope variant.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "1")]
        RegisterClientRequest(super::RegisterClientRequest),
        #[prost(message, tag = "2")]
        RegisterClientResponse(super::RegisterClientResponse),
        #[prost(message, tag = "3")]
        ChatCompletionRequest(super::ChatCompletionRequest),
        #[prost(message, tag = "4")]
        ChatCompletionPartial(super::ChatCompletionPartial),
        #[prost(message, tag = "5")]
        ChatCompletionComplete(super::ChatCompletionComplete),
        #[prost(message, tag = "6")]
        RelayError(super::RelayError),
    }

    impl Payload {
        /// Variant name used in logs and `UnexpectedReply` errors.
        #[must_use]
        pub fn kind(&self) -> &'static str {
            match self {
                Payload::RegisterClientRequest(_) => "RegisterClientRequest",
                Payload::RegisterClientResponse(_) => "RegisterClientResponse",
                Payload::ChatCompletionRequest(_) => "ChatCompletionRequest",
                Payload::ChatCompletionPartial(_) => "ChatCompletionPartial",
                Payload::ChatCompletionComplete(_) => "ChatCompletionComplete",
                Payload::RelayError(_) => "RelayError",
            }
        }
    }
}

/// Proof of key ownership: `signature` is an Ed25519 signature of `nonce`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Identity {
    #[prost(bytes = "vec", tag = "1")]
    pub public_key: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub nonce: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub signature: Vec<u8>,
}

/// Static description of the connecting client.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientMetadata {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub url: String,
    #[prost(string, tag = "3")]
    pub logo_url: String,
    #[prost(string, tag = "4")]
    pub description: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterClientRequest {
    #[prost(message, optional, tag = "1")]
    pub identity: Option<Identity>,
    #[prost(message, optional, tag = "2")]
    pub metadata: Option<ClientMetadata>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterClientResponse {
    #[prost(bool, tag = "1")]
    pub ok: bool,
    #[prost(string, tag = "2")]
    pub message: String,
    /// Registration fee invoice; the connection is unusable while present.
    #[prost(string, optional, tag = "3")]
    pub invoice: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum FeatureFlag {
    Unspecified = 0,
    Image = 1,
    ToolCalls = 2,
    Uncensored = 3,
}

impl FeatureFlag {
    /// Map a model-selector flag string to its wire flag.
    #[must_use]
    pub fn from_selector_flag(flag: &str) -> Option<Self> {
        match flag {
            "vision" => Some(FeatureFlag::Image),
            "tool-use" => Some(FeatureFlag::ToolCalls),
            "uncensored" => Some(FeatureFlag::Uncensored),
            _ => None,
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ImageUrl {
    #[prost(string, tag = "1")]
    pub url: String,
    #[prost(string, tag = "2")]
    pub detail: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TextPart {
    #[prost(string, tag = "1")]
    pub text: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ContentPart {
    #[prost(oneof = "content_part::Part", tags = "1, 2")]
    pub part: Option<content_part::Part>,
}

pub mod content_part {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Part {
        #[prost(message, tag = "1")]
        Text(super::TextPart),
        #[prost(message, tag = "2")]
        ImageUrl(super::ImageUrl),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MultiPartContent {
    #[prost(message, repeated, tag = "1")]
    pub parts: Vec<ContentPart>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChatMessage {
    #[prost(string, tag = "1")]
    pub role: String,
    #[prost(oneof = "chat_message::Content", tags = "2, 3")]
    pub content: Option<chat_message::Content>,
}

pub mod chat_message {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Content {
        #[prost(string, tag = "2")]
        Text(String),
        #[prost(message, tag = "3")]
        Multi(super::MultiPartContent),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ToolFunction {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub description: String,
    /// JSON schema of the parameters, serialized as a string.
    #[prost(string, tag = "3")]
    pub parameters: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Tool {
    #[prost(string, tag = "1")]
    pub r#type: String,
    #[prost(message, optional, tag = "2")]
    pub function: Option<ToolFunction>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ToolCallFunction {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub arguments: String,
}

/// A tool call fragment. A non-empty `id` starts a call, an empty one continues it.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ToolCall {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub r#type: String,
    #[prost(message, optional, tag = "3")]
    pub function: Option<ToolCallFunction>,
}

impl ToolCall {
    #[must_use]
    pub fn name(&self) -> &str {
        self.function.as_ref().map_or("", |f| f.name.as_str())
    }

    #[must_use]
    pub fn arguments(&self) -> &str {
        self.function.as_ref().map_or("", |f| f.arguments.as_str())
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChatCompletionRequest {
    #[prost(uint64, tag = "1")]
    pub request_id: u64,
    #[prost(message, repeated, tag = "2")]
    pub messages: Vec<ChatMessage>,
    #[prost(message, repeated, tag = "3")]
    pub tools: Vec<Tool>,
    #[prost(string, tag = "4")]
    pub tier_selector: String,
    #[prost(uint32, tag = "5")]
    pub max_tokens: u32,
    #[prost(float, tag = "6")]
    pub temperature: f32,
    #[prost(enumeration = "FeatureFlag", repeated, tag = "7")]
    pub flags: Vec<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChatCompletionPartial {
    #[prost(string, tag = "1")]
    pub message: String,
    #[prost(message, repeated, tag = "2")]
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChatCompletionComplete {
    /// Usage invoice for the completed request, if the relay charges for it.
    #[prost(string, optional, tag = "1")]
    pub invoice: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RelayError {
    #[prost(string, tag = "1")]
    pub message: String,
}
