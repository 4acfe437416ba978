use std::sync::Arc;
use std::time::Instant;

use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::{Sink, Stream};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::error::BridgeError;
use crate::observability::log_request_complete;
use crate::payment::InvoicePayer;
use crate::protocol::openai_chat::response_encoder::{encode_chat_response, ResponseMeta};
use crate::stream::{next_reply, Reply, ToolCallAccumulator};
use crate::transport::RelayConnection;

/// Collect every partial into one `chat.completion` document.
///
/// # Errors
///
/// Returns [`BridgeError::Relay`] when the relay reports an error,
/// [`BridgeError::OrphanFragment`] for an unattached tool-call continuation,
/// and any transport error, including closure before completion.
pub(crate) async fn handle_non_streaming_request<S>(
    mut connection: RelayConnection<S>,
    meta: ResponseMeta,
    payer: Arc<dyn InvoicePayer>,
    start_time: Instant,
) -> Result<Response, BridgeError>
where
    S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
{
    let mut content = String::new();
    let mut tool_calls = ToolCallAccumulator::new();
    let mut chunks = 0usize;

    let invoice = loop {
        match next_reply(&mut connection).await? {
            Reply::Partial {
                text,
                tool_calls: fragments,
            } => {
                chunks += 1;
                content.push_str(&text);
                tool_calls.extend(&fragments)?;
            }
            Reply::Complete { invoice } => break invoice,
            Reply::RelayError { message } => return Err(BridgeError::Relay(message)),
        }
    };

    let invoiced = invoice.is_some();
    if let Some(invoice) = invoice {
        payer.pay_invoice(invoice);
    }
    connection.close().await;
    log_request_complete(false, chunks, invoiced, start_time);

    let response = encode_chat_response(&meta, content, tool_calls.finish());
    Ok(Json(response).into_response())
}
