use futures_util::{Sink, Stream};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::error::BridgeError;
use crate::protocol::relay::{Payload, ToolCall};
use crate::transport::RelayConnection;

/// A chat reply read off the relay connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Partial {
        text: String,
        tool_calls: Vec<ToolCall>,
    },
    Complete {
        invoice: Option<String>,
    },
    RelayError {
        message: String,
    },
}

/// Read envelopes until the next chat reply.
///
/// Envelopes that are not chat replies are logged and skipped.
///
/// # Errors
///
/// Returns [`BridgeError::ConnectionClosed`] when the transport ends first, or
/// the transport's own error when a frame cannot be read or decoded.
pub async fn next_reply<S>(connection: &mut RelayConnection<S>) -> Result<Reply, BridgeError>
where
    S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
{
    loop {
        let payload = connection
            .recv()
            .await?
            .ok_or(BridgeError::ConnectionClosed)?;
        match payload {
            Payload::ChatCompletionPartial(partial) => {
                return Ok(Reply::Partial {
                    text: partial.message,
                    tool_calls: partial.tool_calls,
                });
            }
            Payload::ChatCompletionComplete(complete) => {
                return Ok(Reply::Complete {
                    invoice: complete.invoice.filter(|invoice| !invoice.is_empty()),
                });
            }
            Payload::RelayError(err) => {
                tracing::error!(message = %err.message, "relay reported an error");
                return Ok(Reply::RelayError {
                    message: err.message,
                });
            }
            other => {
                tracing::warn!(kind = other.kind(), "skipping unexpected envelope");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::relay::{
        encode_payload, ChatCompletionComplete, ChatCompletionPartial, RegisterClientResponse,
        RelayError, ToolCallFunction,
    };
    use crate::transport::test_support::pipe;
    use futures_util::SinkExt;

    fn binary(payload: Payload) -> Message {
        Message::Binary(encode_payload(payload).into())
    }

    #[tokio::test]
    async fn test_replies_in_arrival_order() {
        let (mut client, mut relay) = pipe().await;
        relay
            .send(binary(Payload::ChatCompletionPartial(ChatCompletionPartial {
                message: "hel".to_string(),
                tool_calls: vec![ToolCall {
                    id: "call_1".to_string(),
                    r#type: "function".to_string(),
                    function: Some(ToolCallFunction {
                        name: "lookup".to_string(),
                        arguments: "{".to_string(),
                    }),
                }],
            })))
            .await
            .expect("send partial");
        relay
            .send(binary(Payload::ChatCompletionComplete(ChatCompletionComplete {
                invoice: Some("lnbc1".to_string()),
            })))
            .await
            .expect("send complete");

        let (text, tool_calls) = match next_reply(&mut client).await.expect("partial") {
            Reply::Partial { text, tool_calls } => (text, tool_calls),
            other => panic!("expected partial, got {other:?}"),
        };
        assert_eq!(text, "hel");
        assert_eq!(tool_calls[0].name(), "lookup");

        let second = next_reply(&mut client).await.expect("complete");
        assert_eq!(
            second,
            Reply::Complete {
                invoice: Some("lnbc1".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_skips_control_text_and_foreign_envelopes() {
        let (mut client, mut relay) = pipe().await;
        relay
            .send(Message::Ping(vec![1, 2].into()))
            .await
            .expect("ping");
        relay
            .send(Message::Text("hello".into()))
            .await
            .expect("text");
        relay
            .send(binary(Payload::RegisterClientResponse(RegisterClientResponse {
                ok: true,
                message: String::new(),
                invoice: None,
            })))
            .await
            .expect("register response");
        relay
            .send(binary(Payload::RelayError(RelayError {
                message: "no provider".to_string(),
            })))
            .await
            .expect("relay error");

        let reply = next_reply(&mut client).await.expect("reply");
        assert_eq!(
            reply,
            Reply::RelayError {
                message: "no provider".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_empty_invoice_means_none() {
        let (mut client, mut relay) = pipe().await;
        relay
            .send(binary(Payload::ChatCompletionComplete(ChatCompletionComplete {
                invoice: Some(String::new()),
            })))
            .await
            .expect("complete");
        assert_eq!(
            next_reply(&mut client).await.expect("reply"),
            Reply::Complete { invoice: None }
        );
    }

    #[tokio::test]
    async fn test_closed_before_terminal_reply() {
        let (mut client, mut relay) = pipe().await;
        relay.close(None).await.expect("close");
        let err = next_reply(&mut client).await.unwrap_err();
        assert!(matches!(err, BridgeError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_undecodable_frame_is_codec_error() {
        let (mut client, mut relay) = pipe().await;
        relay
            .send(Message::Binary(vec![0xff, 0xff].into()))
            .await
            .expect("garbage");
        let err = next_reply(&mut client).await.unwrap_err();
        assert!(matches!(err, BridgeError::Codec(_)));
    }
}
