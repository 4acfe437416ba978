use std::sync::Arc;
use std::time::Instant;

use axum::response::Response;
use bytes::Bytes;
use futures_util::{Sink, Stream};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::error::BridgeError;
use crate::observability::log_request_complete;
use crate::payment::InvoicePayer;
use crate::protocol::openai_chat::response_encoder::{encode_stream_chunk, ResponseMeta};
use crate::stream::{done_frame, error_sse_frame, json_sse_frame, next_reply, Reply};
use crate::transport::RelayConnection;

#[inline]
fn sse_ok_response(body: axum::body::Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = http::StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        http::header::CACHE_CONTROL,
        http::HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        http::header::CONNECTION,
        http::HeaderValue::from_static("keep-alive"),
    );
    response
}

struct StreamState<S> {
    connection: RelayConnection<S>,
    meta: ResponseMeta,
    payer: Arc<dyn InvoicePayer>,
    pending: Option<Reply>,
    abort: Option<BridgeError>,
    done: bool,
    chunks: usize,
    start_time: Instant,
}

impl<S> StreamState<S>
where
    S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
{
    async fn next_frame(&mut self) -> Option<Result<Bytes, BridgeError>> {
        if self.done {
            return None;
        }
        if let Some(err) = self.abort.take() {
            self.done = true;
            return Some(Err(err));
        }

        let reply = match self.pending.take() {
            Some(reply) => Ok(reply),
            None => next_reply(&mut self.connection).await,
        };
        match reply {
            Ok(Reply::Partial { text, tool_calls }) => {
                match json_sse_frame(&encode_stream_chunk(&self.meta, &text, &tool_calls)) {
                    Ok(frame) => {
                        self.chunks += 1;
                        Some(Ok(frame))
                    }
                    Err(err) => Some(Ok(self.fail(err))),
                }
            }
            Ok(Reply::Complete { invoice }) => {
                let invoiced = invoice.is_some();
                if let Some(invoice) = invoice {
                    self.payer.pay_invoice(invoice);
                }
                self.done = true;
                log_request_complete(true, self.chunks, invoiced, self.start_time);
                Some(Ok(Bytes::from(done_frame())))
            }
            Ok(Reply::RelayError { message }) => Some(Ok(self.fail(BridgeError::Relay(message)))),
            Err(err) => Some(Ok(self.fail(err))),
        }
    }

    /// Report `err` in-band, then end the body with an error so the transfer
    /// is seen as failed. `[DONE]` is never sent after a failure.
    fn fail(&mut self, err: BridgeError) -> Bytes {
        tracing::error!(chunks = self.chunks, "stream aborted after first chunk: {err}");
        let frame = error_sse_frame(&err);
        self.abort = Some(err);
        frame
    }
}

/// Answer a streaming request from an authenticated relay connection.
///
/// The first reply is read before the response head is committed, so a
/// failure at that point still produces a proper error status.
///
/// # Errors
///
/// Returns the relay's error, or the transport error, when the first reply
/// is a failure.
pub(crate) async fn handle_streaming_request<S>(
    mut connection: RelayConnection<S>,
    meta: ResponseMeta,
    payer: Arc<dyn InvoicePayer>,
    start_time: Instant,
) -> Result<Response, BridgeError>
where
    S: Stream<Item = Result<Message, WsError>>
        + Sink<Message, Error = WsError>
        + Unpin
        + Send
        + 'static,
{
    let first = next_reply(&mut connection).await?;
    if let Reply::RelayError { message } = first {
        return Err(BridgeError::Relay(message));
    }

    let state = StreamState {
        connection,
        meta,
        payer,
        pending: Some(first),
        abort: None,
        done: false,
        chunks: 0,
        start_time,
    };
    let output_stream = futures_util::stream::unfold(state, |mut state| async move {
        let frame = state.next_frame().await?;
        Some((frame, state))
    });

    Ok(sse_ok_response(axum::body::Body::from_stream(output_stream)))
}
