use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};

pub(crate) mod flow;

use self::flow::handler_inner;
use crate::state::AppState;

/// `POST /chat/completions`.
pub async fn handler(State(state): State<Arc<AppState>>, body: bytes::Bytes) -> Response {
    match handler_inner(state, body).await {
        Ok(response) => response,
        Err(err) => {
            if err.status().is_server_error() {
                tracing::error!("chat completion failed: {err}");
            } else {
                tracing::warn!("chat completion rejected: {err}");
            }
            err.into_response()
        }
    }
}
