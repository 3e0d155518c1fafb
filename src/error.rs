//! Various error types that can occur while using this crate.

use crate::responses::StatusCode;

/// Result type used throughout the crate that uses [`Error`] as default error.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while using this crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An error occurred while trying to connect to the web-socket server.
    #[error("failed to connect to the obs-websocket server")]
    Connect(#[source] tokio_tungstenite::tungstenite::Error),
    /// The connection timeout was reached before the session was established.
    #[error("timeout happened before the connection could be established")]
    Timeout,
    /// The initial handshake with the server didn't succeed.
    #[error("failed to execute the handshake with the server")]
    Handshake(#[from] crate::client::HandshakeError),
    /// Failed to serialize the message to be sent to the server.
    #[error("failed to serialize message")]
    SerializeMessage(#[source] serde_json::Error),
    /// A message could not be sent through the web-socket.
    #[error("failed to send message to the server")]
    Send(#[source] tokio_tungstenite::tungstenite::Error),
    /// The response payload could not be deserialized into the expected shape.
    #[error("the response could not be deserialized")]
    DeserializeResponse(#[source] serde_json::Error),
    /// The server rejected the request, reporting a failure status.
    #[error("request failed: {code:?}")]
    RequestFailed {
        /// Status code describing the kind of failure.
        code: StatusCode,
        /// Further details, provided by the server on some failures.
        comment: Option<String>,
    },
    /// The session ended while the operation was still waiting for its
    /// response.
    #[error("disconnected from the server while waiting")]
    Disconnected,
    /// Tried to interact with the server while no session is established.
    #[error("currently not connected to a server")]
    NotConnected,
    /// A bitmask value contains flags not known to this library.
    #[error("value {0} contains unknown flags")]
    UnknownFlags(u32),
    /// A connect URL did not have the expected `scheme://host:port[/password]`
    /// form.
    #[error("invalid connect URL: {0}")]
    InvalidUrl(&'static str),
}
