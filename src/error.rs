use crate::protocol::error_shapes::openai_error_payload;

/// Error type shared by the bridge's request path.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Missing request body")]
    MissingBody,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Invalid model selector: {0}")]
    InvalidSelector(String),
    #[error("Invalid tier selector: {0}")]
    InvalidTierSelector(String),
    #[error("Failed to connect to relay: {0}")]
    Connect(String),
    #[error("Connection rejected: {0}")]
    HandshakeRejected(String),
    #[error("The registration fee was not paid, invoice: {invoice}")]
    PaymentRequired { invoice: String },
    #[error("Unexpected reply from relay: {0}")]
    UnexpectedReply(String),
    #[error("Relay connection closed before a terminal reply")]
    ConnectionClosed,
    /// Error reported by the relay itself; the message is surfaced verbatim.
    #[error("{0}")]
    Relay(String),
    #[error("Tool call fragment arrived before any tool call was started")]
    OrphanFragment,
    #[error("Wire codec error: {0}")]
    Codec(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad error category for status code selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    Upstream,
    ServerError,
}

impl BridgeError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            BridgeError::MissingBody
            | BridgeError::InvalidRequest(_)
            | BridgeError::InvalidSelector(_)
            | BridgeError::InvalidTierSelector(_) => ErrorCategory::InvalidRequest,
            BridgeError::Connect(_)
            | BridgeError::HandshakeRejected(_)
            | BridgeError::PaymentRequired { .. }
            | BridgeError::UnexpectedReply(_) => ErrorCategory::Upstream,
            BridgeError::ConnectionClosed
            | BridgeError::Relay(_)
            | BridgeError::OrphanFragment
            | BridgeError::Codec(_)
            | BridgeError::Transport(_)
            | BridgeError::Internal(_) => ErrorCategory::ServerError,
        }
    }

    #[must_use]
    pub fn status(&self) -> http::StatusCode {
        http_status_for_category(self.category())
    }
}

fn http_status_for_category(cat: ErrorCategory) -> http::StatusCode {
    match cat {
        ErrorCategory::InvalidRequest => http::StatusCode::BAD_REQUEST,
        ErrorCategory::Upstream => http::StatusCode::BAD_GATEWAY,
        ErrorCategory::ServerError => http::StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Format an error as (`status_code`, OpenAI-shaped JSON body).
#[must_use]
pub fn format_error(err: &BridgeError) -> (http::StatusCode, serde_json::Value) {
    let cat = err.category();
    (
        http_status_for_category(cat),
        openai_error_payload(cat, &err.to_string()),
    )
}

impl axum::response::IntoResponse for BridgeError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = format_error(&self);
        (status, axum::Json(body)).into_response()
    }
}
