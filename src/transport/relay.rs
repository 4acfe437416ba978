//! Authenticated relay connections.
//!
//! A connection is dialed per chat request, registered with a signed nonce and
//! only handed out once the relay explicitly accepts it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::auth::Signer;
use crate::config::RelayConfig;
use crate::error::BridgeError;
use crate::protocol::relay::{
    decode_envelope, encode_payload, ClientMetadata, Identity, Payload, RegisterClientRequest,
};

static NONCE_SEQ: AtomicU64 = AtomicU64::new(0);

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One WebSocket connection to the relay carrying protobuf envelopes.
pub struct RelayConnection<S = WsStream> {
    ws: S,
}

impl<S> RelayConnection<S>
where
    S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
{
    #[must_use]
    pub fn new(ws: S) -> Self {
        Self { ws }
    }

    /// Send one envelope as a binary frame.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Transport`] when the frame cannot be written.
    pub async fn send(&mut self, payload: Payload) -> Result<(), BridgeError> {
        let kind = payload.kind();
        self.ws
            .send(Message::Binary(encode_payload(payload).into()))
            .await
            .map_err(|e| BridgeError::Transport(format!("failed to send {kind}: {e}")))
    }

    /// Receive the next envelope, or `None` once the transport is closed.
    ///
    /// Control frames are consumed silently; text frames are not part of the
    /// protocol and are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Codec`] for undecodable envelopes and
    /// [`BridgeError::Transport`] for transport failures other than closure.
    pub async fn recv(&mut self) -> Result<Option<Payload>, BridgeError> {
        while let Some(frame) = self.ws.next().await {
            match frame {
                Ok(Message::Binary(data)) => return decode_envelope(&data).map(Some),
                Ok(Message::Close(_)) => return Ok(None),
                Ok(Message::Text(text)) => {
                    tracing::warn!(len = text.len(), "ignoring text frame from relay");
                }
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(err) if is_closed(&err) => return Ok(None),
                Err(err) => return Err(BridgeError::Transport(err.to_string())),
            }
        }
        Ok(None)
    }

    /// Close the connection, ignoring errors from an already-closed peer.
    pub async fn close(mut self) {
        if let Err(err) = self.ws.close().await {
            tracing::debug!("relay connection close: {err}");
        }
    }

    /// Register the client identity and wait for the relay's verdict.
    ///
    /// Exactly one envelope is read; nothing else may be sent before it arrives.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::UnexpectedReply`] when the reply is not a registration response.
    /// - [`BridgeError::HandshakeRejected`] when the relay declines the client.
    /// - [`BridgeError::PaymentRequired`] when the registration fee is unpaid.
    /// - [`BridgeError::ConnectionClosed`] when the relay hangs up first.
    pub async fn register(
        &mut self,
        signer: &dyn Signer,
        metadata: ClientMetadata,
    ) -> Result<(), BridgeError> {
        let nonce = fresh_nonce();
        let signature = signer.sign(&nonce);
        self.send(Payload::RegisterClientRequest(RegisterClientRequest {
            identity: Some(Identity {
                public_key: signer.public_key(),
                nonce,
                signature,
            }),
            metadata: Some(metadata),
        }))
        .await?;

        tracing::debug!("waiting for relay registration response");
        let reply = self.recv().await?.ok_or(BridgeError::ConnectionClosed)?;
        let response = match reply {
            Payload::RegisterClientResponse(response) => response,
            other => {
                return Err(BridgeError::UnexpectedReply(format!(
                    "expected RegisterClientResponse, got {}",
                    other.kind()
                )));
            }
        };

        if !response.ok {
            return Err(BridgeError::HandshakeRejected(response.message));
        }
        if let Some(invoice) = response.invoice.filter(|invoice| !invoice.is_empty()) {
            tracing::warn!(%invoice, "registration fee was not paid, pay the invoice to continue");
            return Err(BridgeError::PaymentRequired { invoice });
        }
        tracing::debug!("relay accepted connection");
        Ok(())
    }
}

fn is_closed(err: &WsError) -> bool {
    matches!(
        err,
        WsError::ConnectionClosed
            | WsError::AlreadyClosed
            | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake)
    )
}

/// Nonce bytes: `nonce-<unix millis>-<seq>`, unique per attempt in practice.
fn fresh_nonce() -> Vec<u8> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis());
    let seq = NONCE_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("nonce-{millis}-{seq}").into_bytes()
}

#[must_use]
pub fn client_metadata(relay: &RelayConfig) -> ClientMetadata {
    ClientMetadata {
        name: relay.client_name.clone(),
        url: relay.client_url.clone(),
        logo_url: relay.client_logo_url.clone(),
        description: relay.client_description.clone(),
    }
}

/// Dial the relay WebSocket endpoint.
///
/// # Errors
///
/// Returns [`BridgeError::Connect`] when the connection cannot be established
/// within `relay.connect_timeout_secs`.
pub async fn connect(relay: &RelayConfig) -> Result<RelayConnection, BridgeError> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let url = relay.ws_url();
    let timeout = Duration::from_secs(relay.connect_timeout_secs);
    match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url)).await {
        Ok(Ok((ws, _response))) => Ok(RelayConnection::new(ws)),
        Ok(Err(err)) => Err(BridgeError::Connect(format!("{url}: {err}"))),
        Err(_) => Err(BridgeError::Connect(format!(
            "{url}: timed out after {}s",
            relay.connect_timeout_secs
        ))),
    }
}

/// Open a fresh connection and complete the registration handshake.
///
/// # Errors
///
/// Returns any error from [`connect`] or [`RelayConnection::register`].
pub async fn authenticate(
    relay: &RelayConfig,
    signer: &dyn Signer,
) -> Result<RelayConnection, BridgeError> {
    let mut connection = connect(relay).await?;
    tracing::info!(url = relay.ws_url(), "registering with relay");
    connection.register(signer, client_metadata(relay)).await?;
    Ok(connection)
}

#[cfg(test)]
pub(crate) mod test_support {
    use tokio::io::DuplexStream;
    use tokio_tungstenite::tungstenite::protocol::Role;
    use tokio_tungstenite::WebSocketStream;

    use super::RelayConnection;

    pub(crate) type PipeStream = WebSocketStream<DuplexStream>;

    /// A client connection wired to an in-memory relay peer.
    pub(crate) async fn pipe() -> (RelayConnection<PipeStream>, PipeStream) {
        let (client_io, relay_io) = tokio::io::duplex(64 * 1024);
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        let relay = WebSocketStream::from_raw_socket(relay_io, Role::Server, None).await;
        (RelayConnection::new(client), relay)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::pipe;
    use super::*;
    use crate::auth::Ed25519Identity;
    use crate::protocol::relay::{RegisterClientResponse, RelayError};
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    async fn expect_register(relay: &mut test_support::PipeStream) -> RegisterClientRequest {
        let Some(Ok(Message::Binary(data))) = relay.next().await else {
            panic!("expected binary registration frame");
        };
        match decode_envelope(&data).expect("decode") {
            Payload::RegisterClientRequest(request) => request,
            other => panic!("unexpected {}", other.kind()),
        }
    }

    async fn reply(relay: &mut test_support::PipeStream, payload: Payload) {
        relay
            .send(Message::Binary(encode_payload(payload).into()))
            .await
            .expect("relay send");
    }

    fn metadata() -> ClientMetadata {
        client_metadata(&RelayConfig::default())
    }

    #[tokio::test]
    async fn test_register_sends_signed_nonce_and_accepts() {
        let identity = Ed25519Identity::generate();
        let (mut client, mut relay) = pipe().await;

        let relay_task = tokio::spawn(async move {
            let request = expect_register(&mut relay).await;
            reply(
                &mut relay,
                Payload::RegisterClientResponse(RegisterClientResponse {
                    ok: true,
                    message: String::new(),
                    invoice: None,
                }),
            )
            .await;
            request
        });

        client.register(&identity, metadata()).await.expect("accepted");
        let request = relay_task.await.expect("relay task");

        let proof = request.identity.expect("identity");
        assert!(proof.nonce.starts_with(b"nonce-"));
        let key: [u8; 32] = proof.public_key.as_slice().try_into().expect("key len");
        let signature = Signature::from_slice(&proof.signature).expect("signature len");
        VerifyingKey::from_bytes(&key)
            .expect("key")
            .verify(&proof.nonce, &signature)
            .expect("signature verifies");
        assert_eq!(
            request.metadata.expect("metadata").name,
            "Spark OpenAI Adapter"
        );
    }

    #[tokio::test]
    async fn test_register_rejected() {
        let identity = Ed25519Identity::generate();
        let (mut client, mut relay) = pipe().await;
        tokio::spawn(async move {
            expect_register(&mut relay).await;
            reply(
                &mut relay,
                Payload::RegisterClientResponse(RegisterClientResponse {
                    ok: false,
                    message: "unknown key".to_string(),
                    invoice: None,
                }),
            )
            .await;
        });

        let err = client.register(&identity, metadata()).await.unwrap_err();
        assert!(matches!(err, BridgeError::HandshakeRejected(ref m) if m == "unknown key"));
    }

    #[tokio::test]
    async fn test_register_with_invoice_requires_payment() {
        let identity = Ed25519Identity::generate();
        let (mut client, mut relay) = pipe().await;
        tokio::spawn(async move {
            expect_register(&mut relay).await;
            reply(
                &mut relay,
                Payload::RegisterClientResponse(RegisterClientResponse {
                    ok: true,
                    message: String::new(),
                    invoice: Some("lnbcrt500n1fee".to_string()),
                }),
            )
            .await;
        });

        let err = client.register(&identity, metadata()).await.unwrap_err();
        assert!(matches!(err, BridgeError::PaymentRequired { ref invoice } if invoice == "lnbcrt500n1fee"));
    }

    #[tokio::test]
    async fn test_register_empty_invoice_is_accepted() {
        let identity = Ed25519Identity::generate();
        let (mut client, mut relay) = pipe().await;
        tokio::spawn(async move {
            expect_register(&mut relay).await;
            reply(
                &mut relay,
                Payload::RegisterClientResponse(RegisterClientResponse {
                    ok: true,
                    message: String::new(),
                    invoice: Some(String::new()),
                }),
            )
            .await;
        });

        assert!(client.register(&identity, metadata()).await.is_ok());
    }

    #[tokio::test]
    async fn test_register_unexpected_reply() {
        let identity = Ed25519Identity::generate();
        let (mut client, mut relay) = pipe().await;
        tokio::spawn(async move {
            expect_register(&mut relay).await;
            reply(
                &mut relay,
                Payload::RelayError(RelayError {
                    message: "busy".to_string(),
                }),
            )
            .await;
        });

        let err = client.register(&identity, metadata()).await.unwrap_err();
        assert!(matches!(err, BridgeError::UnexpectedReply(ref m) if m.contains("RelayError")));
    }

    #[tokio::test]
    async fn test_register_relay_hangs_up() {
        let identity = Ed25519Identity::generate();
        let (mut client, mut relay) = pipe().await;
        tokio::spawn(async move {
            expect_register(&mut relay).await;
            let _ = relay.close(None).await;
        });

        let err = client.register(&identity, metadata()).await.unwrap_err();
        assert!(matches!(err, BridgeError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_connect_failure_is_connect_error() {
        let relay = RelayConfig {
            url: Some("ws://127.0.0.1:9/consumer/ws".to_string()),
            connect_timeout_secs: 2,
            ..RelayConfig::default()
        };
        let err = connect(&relay).await.err().expect("connect should fail");
        assert!(matches!(err, BridgeError::Connect(_)));
    }

    #[test]
    fn test_nonces_are_fresh() {
        assert_ne!(fresh_nonce(), fresh_nonce());
    }
}
