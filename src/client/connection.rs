use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::{
    sync::oneshot,
    time::{self, Duration},
};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::{
    requests::{ClientRequest, EventSubscription, Identify},
    responses::{
        Hello, Identified, RequestBatchResponse, RequestResponse, ServerMessage, Status,
        WebSocketCloseCode,
    },
    RPC_VERSION,
};

/// How long to wait for the server's `Hello` after the socket is up.
const HELLO_TIMEOUT: Duration = Duration::from_secs(5);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// List of in-flight requests waiting for their response, keyed by request
/// ID.
#[derive(Default, Debug)]
pub(super) struct ReceiverList(Mutex<HashMap<u64, oneshot::Sender<(Status, serde_json::Value)>>>);

impl ReceiverList {
    /// Register a receiver that is completed once a response with the given
    /// ID arrives.
    pub fn add(&self, id: u64) -> oneshot::Receiver<(Status, serde_json::Value)> {
        let (tx, rx) = oneshot::channel();
        lock(&self.0).insert(id, tx);
        rx
    }

    /// Remove a previously registered receiver, in case sending the request
    /// failed.
    pub fn remove(&self, id: u64) {
        lock(&self.0).remove(&id);
    }

    /// Complete the receiver matching the response's ID. Responses without a
    /// matching entry are dropped.
    pub fn notify(&self, response: RequestResponse) {
        let RequestResponse {
            request_type: _,
            request_id,
            request_status,
            response_data,
        } = response;

        let Ok(id) = request_id.parse() else {
            warn!(%request_id, "response with unparsable request ID, dropping");
            return;
        };

        match lock(&self.0).remove(&id) {
            // The send fails if the caller dropped its handle, which cancels
            // the request.
            Some(tx) => {
                tx.send((request_status, response_data)).ok();
            }
            None => warn!(%id, "response without a waiting request, dropping"),
        }
    }

    /// Clear the list, completing all outstanding receivers with a closed
    /// channel.
    pub fn reset(&self) {
        lock(&self.0).clear();
    }
}

/// List of in-flight request batches waiting for their response, keyed by
/// batch ID.
#[derive(Default, Debug)]
pub(super) struct BatchReceiverList(Mutex<HashMap<u64, oneshot::Sender<RequestBatchResponse>>>);

impl BatchReceiverList {
    /// Register a receiver that is completed once the batch response with
    /// the given ID arrives.
    pub fn add(&self, id: u64) -> oneshot::Receiver<RequestBatchResponse> {
        let (tx, rx) = oneshot::channel();
        lock(&self.0).insert(id, tx);
        rx
    }

    /// Remove a previously registered receiver.
    pub fn remove(&self, id: u64) {
        lock(&self.0).remove(&id);
    }

    /// Complete the receiver matching the response's batch ID.
    pub fn notify(&self, response: RequestBatchResponse) {
        let Ok(id) = response.request_id.parse() else {
            warn!(request_id = %response.request_id, "batch response with unparsable ID, dropping");
            return;
        };

        match lock(&self.0).remove(&id) {
            Some(tx) => {
                tx.send(response).ok();
            }
            None => warn!(%id, "batch response without a waiting batch, dropping"),
        }
    }

    /// Clear the list, completing all outstanding receivers with a closed
    /// channel.
    pub fn reset(&self) {
        lock(&self.0).clear();
    }
}

/// Errors that can occur while performing the initial handshake with the
/// server.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum HandshakeError {
    /// The connection was closed before the handshake completed.
    #[error("connection closed during the handshake: {}", match .0 {
        Some(details) => details.reason.as_str(),
        None => "no details provided",
    })]
    ConnectionClosed(Option<CloseDetails>),
    /// Receiving a message did not succeed.
    #[error("failed reading a websocket message")]
    Receive(#[source] tokio_tungstenite::tungstenite::Error),
    /// The web-socket message was not convertible to text.
    #[error("websocket message not convertible to text")]
    IntoText(#[source] tokio_tungstenite::tungstenite::Error),
    /// A message from the server could not be deserialized.
    #[error("failed deserializing message")]
    DeserializeMessage(#[source] serde_json::Error),
    /// A message could not be serialized for sending.
    #[error("failed serializing message")]
    SerializeMessage(#[source] serde_json::Error),
    /// Sending a message to the server failed.
    #[error("failed to send message to the server")]
    Send(#[source] tokio_tungstenite::tungstenite::Error),
    /// Didn't receive a `Hello` from the server after connecting.
    #[error("didn't receive a `Hello` message after connecting")]
    NoHello,
    /// The server requires authentication but no password was supplied.
    #[error("a password is required but none was supplied")]
    MissingPassword,
    /// The server rejected the authentication attempt.
    #[error("authentication failed")]
    AuthenticationFailed,
    /// The server does not speak the RPC version this library implements.
    #[error("server does not support RPC version {0}")]
    UnsupportedRpcVersion(u32),
    /// The server sent a message that is not valid in the current handshake
    /// state.
    #[error("unexpected message during the handshake")]
    UnexpectedMessage,
}

/// Description of why the server closed the connection.
#[derive(Debug)]
pub struct CloseDetails {
    /// The raw close code from the close frame.
    pub code: u16,
    /// Textual close reason, or additional details for the code.
    pub reason: String,
}

impl CloseDetails {
    /// Translate the raw close code into the server's close code table, if
    /// it falls into the reserved range.
    pub fn close_code(&self) -> Option<WebSocketCloseCode> {
        WebSocketCloseCode::try_from(self.code).ok()
    }
}

/// Drive the identification exchange on a fresh connection: wait for the
/// server's `Hello`, answer with an `Identify` carrying the authentication
/// proof if demanded, and wait for the confirming `Identified`.
pub(super) async fn handshake(
    write: &mut (impl Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin),
    read: &mut (impl Stream<Item = tokio_tungstenite::tungstenite::Result<Message>> + Unpin),
    password: Option<&str>,
    event_subscriptions: Option<EventSubscription>,
) -> Result<Identified, HandshakeError> {
    async fn read_message(
        read: &mut (impl Stream<Item = tokio_tungstenite::tungstenite::Result<Message>> + Unpin),
    ) -> Result<ServerMessage, HandshakeError> {
        let mut message = read
            .next()
            .await
            .ok_or(HandshakeError::ConnectionClosed(None))?
            .map_err(HandshakeError::Receive)?;

        if let Message::Close(info) = &mut message {
            return Err(close_error(info.take().map(|info| CloseDetails {
                code: u16::from(info.code),
                reason: info.reason.into_owned(),
            })));
        }

        let message = message.into_text().map_err(HandshakeError::IntoText)?;

        serde_json::from_str::<ServerMessage>(&message).map_err(HandshakeError::DeserializeMessage)
    }

    let server_message = time::timeout(HELLO_TIMEOUT, read_message(read))
        .await
        .map_err(|_| HandshakeError::NoHello)?;

    match server_message? {
        ServerMessage::Hello(Hello {
            obs_web_socket_version: _,
            rpc_version: _,
            authentication,
        }) => {
            let authentication = match (authentication, password) {
                (Some(auth), Some(password)) => {
                    Some(create_auth_response(&auth.challenge, &auth.salt, password))
                }
                (Some(_), None) => return Err(HandshakeError::MissingPassword),
                // Supplying a password when none is required is fine, the
                // reply simply carries no authentication string.
                (None, _) => None,
            };

            let req = serde_json::to_string(&ClientRequest::Identify(Identify {
                rpc_version: RPC_VERSION,
                authentication,
                event_subscriptions,
            }))
            .map_err(HandshakeError::SerializeMessage)?;

            write
                .send(Message::text(req))
                .await
                .map_err(HandshakeError::Send)?;
        }
        _ => return Err(HandshakeError::UnexpectedMessage),
    }

    match read_message(read).await? {
        ServerMessage::Identified(identified) => {
            debug!(
                rpc_version = identified.negotiated_rpc_version,
                "identified against the server",
            );
            Ok(identified)
        }
        _ => Err(HandshakeError::UnexpectedMessage),
    }
}

fn close_error(details: Option<CloseDetails>) -> HandshakeError {
    match details.as_ref().and_then(CloseDetails::close_code) {
        Some(WebSocketCloseCode::AuthenticationFailed) => HandshakeError::AuthenticationFailed,
        Some(WebSocketCloseCode::UnsupportedRpcVersion) => {
            HandshakeError::UnsupportedRpcVersion(RPC_VERSION)
        }
        _ => HandshakeError::ConnectionClosed(details),
    }
}

/// Derive the authentication string for the given challenge parameters:
/// two rounds of SHA-256, each base64-encoded with the standard padded
/// alphabet.
fn create_auth_response(challenge: &str, salt: &str, password: &str) -> String {
    use base64::engine::{general_purpose, Config, Engine};
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());

    let mut auth = String::with_capacity(
        base64::encoded_len(
            Sha256::output_size(),
            general_purpose::STANDARD.config().encode_padding(),
        )
        .unwrap_or_default(),
    );

    general_purpose::STANDARD.encode_string(hasher.finalize_reset(), &mut auth);

    hasher.update(auth.as_bytes());
    hasher.update(challenge.as_bytes());
    auth.clear();

    general_purpose::STANDARD.encode_string(hasher.finalize(), &mut auth);

    auth
}
