//! Messages received from the server.

pub mod general;
pub mod scenes;
pub mod ui;

use serde::{de, Deserialize, Deserializer};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Any incoming message, decoded from the `{op, d}` envelope in two steps:
/// the opcode selects the payload variant, then the data field is parsed
/// into that variant's shape.
#[derive(Debug)]
pub(crate) enum ServerMessage {
    /// First message sent by the server immediately on connection. Carries
    /// the authentication challenge if authentication is required, and the
    /// RPC version for negotiation.
    Hello(Hello),
    /// The identification was accepted and the session is ready for normal
    /// operation.
    Identified(Identified),
    /// Something happened on the server that this session subscribed to.
    Event(crate::events::RawEvent),
    /// Response to a single request from this client.
    RequestResponse(RequestResponse),
    /// Response to a request batch from this client.
    RequestBatchResponse(RequestBatchResponse),
}

impl<'de> Deserialize<'de> for ServerMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawServerMessage {
            #[serde(rename = "op")]
            op_code: OpCode,
            #[serde(rename = "d")]
            data: serde_json::Value,
        }

        #[derive(Deserialize_repr)]
        #[repr(u8)]
        enum OpCode {
            Hello = 0,
            Identified = 2,
            Event = 5,
            RequestResponse = 7,
            RequestBatchResponse = 9,
        }

        let raw = RawServerMessage::deserialize(deserializer)?;

        Ok(match raw.op_code {
            OpCode::Hello => {
                ServerMessage::Hello(serde_json::from_value(raw.data).map_err(de::Error::custom)?)
            }
            OpCode::Identified => ServerMessage::Identified(
                serde_json::from_value(raw.data).map_err(de::Error::custom)?,
            ),
            OpCode::Event => {
                ServerMessage::Event(serde_json::from_value(raw.data).map_err(de::Error::custom)?)
            }
            OpCode::RequestResponse => ServerMessage::RequestResponse(
                serde_json::from_value(raw.data).map_err(de::Error::custom)?,
            ),
            OpCode::RequestBatchResponse => ServerMessage::RequestBatchResponse(
                serde_json::from_value(raw.data).map_err(de::Error::custom)?,
            ),
        })
    }
}

/// First message sent by the server on connection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Hello {
    #[allow(dead_code)]
    pub obs_web_socket_version: semver::Version,
    /// RPC version the server would like to use.
    #[allow(dead_code)]
    pub rpc_version: u32,
    pub authentication: Option<Authentication>,
}

/// Challenge parameters for the authentication string.
#[derive(Debug, Deserialize)]
pub(crate) struct Authentication {
    pub challenge: String,
    pub salt: String,
}

/// The identification was accepted.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Identified {
    /// RPC version the session will use.
    pub negotiated_rpc_version: u32,
}

/// Response to a single request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RequestResponse {
    #[allow(dead_code)]
    pub request_type: String,
    pub request_id: String,
    pub request_status: Status,
    #[serde(default)]
    pub response_data: serde_json::Value,
}

/// Response to a request batch. Results are ordered like the submitted
/// requests, and cover a prefix of them when the batch was halted early.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RequestBatchResponse {
    pub request_id: String,
    pub results: Vec<BatchResponseElement>,
}

/// One result of a request batch. The ID is only present when the caller
/// supplied one on the matching sub-request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchResponseElement {
    #[allow(dead_code)]
    pub request_type: String,
    #[serde(default)]
    #[allow(dead_code)]
    pub request_id: Option<String>,
    pub request_status: Status,
    #[serde(default)]
    pub response_data: serde_json::Value,
}

/// Outcome of a request as reported by the server.
#[derive(Clone, Debug, Deserialize)]
pub struct Status {
    /// Whether the request succeeded. `true` exactly when `code` is
    /// [`StatusCode::Success`].
    pub result: bool,
    /// Status code giving the failure category.
    pub code: StatusCode,
    /// Further details, provided by the server on some failures.
    pub comment: Option<String>,
}

/// The status code gives information about the result of a request. It gives
/// further insight into what went wrong, if a request failed.
#[derive(
    Clone, Copy, Debug, Deserialize_repr, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize_repr,
)]
#[repr(u16)]
#[non_exhaustive]
pub enum StatusCode {
    /// Unknown status, should never be used.
    Unknown = 0,
    /// For internal use to signify a successful field check.
    NoError = 10,

    /// The request has succeeded.
    Success = 100,

    /// The `requestType` field is missing from the request data.
    MissingRequestType = 203,
    /// The request type is invalid or does not exist.
    UnknownRequestType = 204,
    /// Generic error code, with details in the comment.
    GenericError = 205,
    /// The request batch execution type is not supported.
    UnsupportedRequestBatchExecutionType = 206,
    /// The server is not ready to handle the request. Occurs during scene
    /// collection changes and shutdown; such requests may be retried.
    NotReady = 207,

    /// A required request field is missing.
    MissingRequestField = 300,
    /// The request does not have a valid `requestData` object.
    MissingRequestData = 301,

    /// Generic invalid request field message, with details in the comment.
    InvalidRequestField = 400,
    /// A request field has the wrong data type.
    InvalidRequestFieldType = 401,
    /// A request field (number) is outside the allowed range.
    RequestFieldOutOfRange = 402,
    /// A request field (string or array) is empty and cannot be.
    RequestFieldEmpty = 403,
    /// There are too many request fields, for example two mutually exclusive
    /// optional fields at once.
    TooManyRequestFields = 404,

    /// An output is running and cannot be in order to perform the request.
    OutputRunning = 500,
    /// An output is not running and should be.
    OutputNotRunning = 501,
    /// An output is paused and should not be.
    OutputPaused = 502,
    /// An output is not paused and should be.
    OutputNotPaused = 503,
    /// An output is disabled and should not be.
    OutputDisabled = 504,
    /// Studio mode is active and cannot be.
    StudioModeActive = 505,
    /// Studio mode is not active and should be.
    StudioModeNotActive = 506,

    /// The resource (input, profile, output, ...) was not found.
    ResourceNotFound = 600,
    /// The resource already exists.
    ResourceAlreadyExists = 601,
    /// The type of resource found is invalid.
    InvalidResourceType = 602,
    /// There are not enough instances of the resource to perform the
    /// request.
    NotEnoughResources = 603,
    /// The state of the resource is invalid, for example blocked from being
    /// accessed.
    InvalidResourceState = 604,
    /// The specified input had the wrong kind.
    InvalidInputKind = 605,
    /// The resource does not support being configured.
    ResourceNotConfigurable = 606,
    /// The specified filter had the wrong kind.
    InvalidFilterKind = 607,

    /// Creating the resource failed.
    ResourceCreationFailed = 700,
    /// Performing an action on the resource failed.
    ResourceActionFailed = 701,
    /// Processing the request failed unexpectedly, with details in the
    /// comment.
    RequestProcessingFailed = 702,
    /// The combination of request fields cannot be used to perform an
    /// action.
    CannotAct = 703,
}

/// Close codes defined by the server on top of the standard web-socket ones,
/// pinning down why a session was terminated.
#[derive(
    Clone, Copy, Debug, Deserialize_repr, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize_repr,
)]
#[repr(u16)]
#[non_exhaustive]
pub enum WebSocketCloseCode {
    /// Unknown reason, should never be used.
    UnknownReason = 4000,
    /// The server was unable to decode the incoming message.
    MessageDecodeError = 4002,
    /// A data field is required but missing from the payload.
    MissingDataField = 4003,
    /// A data field's value type is invalid.
    InvalidDataFieldType = 4004,
    /// A data field's value is invalid.
    InvalidDataFieldValue = 4005,
    /// The specified `op` was invalid or missing.
    UnknownOpCode = 4006,
    /// A message other than `Identify` arrived before identification.
    NotIdentified = 4007,
    /// An `Identify` message arrived while already identified. Only
    /// `Reidentify` may change session parameters afterwards.
    AlreadyIdentified = 4008,
    /// The authentication attempt failed.
    AuthenticationFailed = 4009,
    /// The server detected an unsupported RPC protocol version.
    UnsupportedRpcVersion = 4010,
    /// The session has been invalidated on the server side, for example by
    /// kicking the client from the session list. Do not reconnect
    /// automatically on this code.
    SessionInvalidated = 4011,
    /// A requested feature is not supported due to hardware or software
    /// limitations.
    UnsupportedFeature = 4012,
}

impl TryFrom<u16> for WebSocketCloseCode {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Ok(match value {
            4000 => Self::UnknownReason,
            4002 => Self::MessageDecodeError,
            4003 => Self::MissingDataField,
            4004 => Self::InvalidDataFieldType,
            4005 => Self::InvalidDataFieldValue,
            4006 => Self::UnknownOpCode,
            4007 => Self::NotIdentified,
            4008 => Self::AlreadyIdentified,
            4009 => Self::AuthenticationFailed,
            4010 => Self::UnsupportedRpcVersion,
            4011 => Self::SessionInvalidated,
            4012 => Self::UnsupportedFeature,
            other => return Err(other),
        })
    }
}
