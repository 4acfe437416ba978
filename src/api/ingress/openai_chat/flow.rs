use std::sync::Arc;
use std::time::Instant;

use axum::response::Response;

use crate::api::common::{handle_non_streaming_request, handle_streaming_request};
use crate::error::BridgeError;
use crate::protocol::openai_chat::decoder::translate_chat_request;
use crate::protocol::openai_chat::response_encoder::ResponseMeta;
use crate::protocol::relay::Payload;
use crate::state::AppState;
use crate::transport::authenticate;

pub(crate) async fn handler_inner(
    state: Arc<AppState>,
    body: bytes::Bytes,
) -> Result<Response, BridgeError> {
    let start_time = Instant::now();
    let translated = translate_chat_request(&body)?;
    let meta = ResponseMeta::new(&translated.model);
    tracing::debug!(
        response_id = %meta.id,
        stream = translated.stream,
        messages = translated.request.messages.len(),
        tools = translated.request.tools.len(),
        "translated chat request"
    );

    let mut connection = authenticate(&state.config.relay, state.identity.as_ref()).await?;
    connection
        .send(Payload::ChatCompletionRequest(translated.request))
        .await?;

    let payer = Arc::clone(&state.payer);
    if translated.stream {
        handle_streaming_request(connection, meta, payer, start_time).await
    } else {
        handle_non_streaming_request(connection, meta, payer, start_time).await
    }
}
