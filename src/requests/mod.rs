//! Messages sent to the server, and the registry trait that binds typed
//! request payloads to their wire discriminators.

use bitflags::bitflags;
use serde::{de::DeserializeOwned, ser::SerializeStruct, Deserialize, Serialize};
use serde_repr::Serialize_repr;
use serde_with::skip_serializing_none;

pub mod general;
pub mod scenes;
pub mod ui;

/// A typed request payload understood by the server.
///
/// Implementations pair an on-wire discriminator with the request's payload
/// shape and the payload shape of a successful response, forming the typed
/// registry the engine dispatches over. Requests without parameters are unit
/// structs, which serialize to `null` and are omitted from the wire message.
///
/// The trait is open: downstream crates implement it to drive requests this
/// library doesn't ship.
///
/// ```
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// #[serde(rename_all = "camelCase")]
/// struct SetSceneName<'a> {
///     scene_name: &'a str,
///     new_scene_name: &'a str,
/// }
///
/// impl obsession::requests::RequestType for SetSceneName<'_> {
///     const NAME: &'static str = "SetSceneName";
///     type Response = ();
/// }
/// ```
pub trait RequestType: Serialize {
    /// The request's discriminator, as spelled on the wire.
    const NAME: &'static str;
    /// Payload shape carried by a successful response. Use `()` for requests
    /// that respond without data.
    type Response: DeserializeOwned + Send + 'static;
}

/// Any outgoing message, wrapped into the `{op, d}` envelope on
/// serialization.
pub(crate) enum ClientRequest<'a> {
    /// Response to the server's `Hello`, carrying authentication proof and
    /// session parameters.
    Identify(Identify),
    /// Update of the session parameters, at any time after identification.
    Reidentify(Reidentify),
    /// A single request, correlated by its ID.
    Request(Request<'a>),
    /// An ordered list of requests, executed under a batch policy.
    RequestBatch(RequestBatch<'a>),
}

impl Serialize for ClientRequest<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        #[derive(Serialize_repr)]
        #[repr(u8)]
        enum OpCode {
            Identify = 1,
            Reidentify = 3,
            Request = 6,
            RequestBatch = 8,
        }

        fn write_envelope<S>(
            serializer: S,
            op: OpCode,
            d: &impl Serialize,
        ) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            let mut state = serializer.serialize_struct("ClientRequest", 2)?;
            state.serialize_field("op", &op)?;
            state.serialize_field("d", d)?;
            state.end()
        }

        match self {
            Self::Identify(value) => write_envelope(serializer, OpCode::Identify, value),
            Self::Reidentify(value) => write_envelope(serializer, OpCode::Reidentify, value),
            Self::Request(value) => write_envelope(serializer, OpCode::Request, value),
            Self::RequestBatch(value) => write_envelope(serializer, OpCode::RequestBatch, value),
        }
    }
}

/// Reply to the server's `Hello`. Contains the authentication string if the
/// server demanded one, along with the requested RPC version and event
/// subscriptions.
#[skip_serializing_none]
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Identify {
    /// RPC version that the client requests to speak.
    pub rpc_version: u32,
    pub authentication: Option<String>,
    /// Bitmask of event categories to subscribe to. Leaving it out subscribes
    /// to all non-high-volume categories.
    pub event_subscriptions: Option<EventSubscription>,
}

/// Update of the session parameters after identification.
#[skip_serializing_none]
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Reidentify {
    pub event_subscriptions: Option<EventSubscription>,
}

/// A single correlated request.
#[skip_serializing_none]
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Request<'a> {
    pub request_id: &'a str,
    pub request_type: &'static str,
    pub request_data: Option<serde_json::Value>,
}

/// An ordered list of requests executed by the server under the given
/// policy. The batch ID travels as `requestId` on the wire.
#[skip_serializing_none]
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RequestBatch<'a> {
    pub request_id: &'a str,
    /// Stop processing at the first failed request. The response list then
    /// only covers the processed prefix.
    pub halt_on_failure: Option<bool>,
    pub execution_type: Option<ExecutionType>,
    pub requests: &'a [BatchRequest],
}

/// One element of a request batch. The ID is optional here, unlike in
/// [`Request`].
#[skip_serializing_none]
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchRequest {
    pub request_id: Option<String>,
    pub request_type: &'static str,
    pub request_data: Option<serde_json::Value>,
}

bitflags! {
    /// Bitmask of event categories that the server delivers to this session,
    /// chosen when connecting or through [`Client::reidentify`].
    ///
    /// High-volume categories are excluded from [`EventSubscription::ALL`]
    /// and must be opted into explicitly.
    ///
    /// [`Client::reidentify`]: crate::Client::reidentify
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct EventSubscription: u32 {
        /// No events at all.
        const NONE = 0;
        /// Events in the `General` category.
        const GENERAL = 1 << 0;
        /// Events in the `Config` category.
        const CONFIG = 1 << 1;
        /// Events in the `Scenes` category.
        const SCENES = 1 << 2;
        /// Events in the `Inputs` category.
        const INPUTS = 1 << 3;
        /// Events in the `Transitions` category.
        const TRANSITIONS = 1 << 4;
        /// Events in the `Filters` category.
        const FILTERS = 1 << 5;
        /// Events in the `Outputs` category.
        const OUTPUTS = 1 << 6;
        /// Events in the `SceneItems` category.
        const SCENE_ITEMS = 1 << 7;
        /// Events in the `MediaInputs` category.
        const MEDIA_INPUTS = 1 << 8;
        /// Vendor-specific events.
        const VENDORS = 1 << 9;
        /// Events in the `Ui` category.
        const UI = 1 << 10;

        /// Union of all non-high-volume categories.
        const ALL = Self::GENERAL.bits()
            | Self::CONFIG.bits()
            | Self::SCENES.bits()
            | Self::INPUTS.bits()
            | Self::TRANSITIONS.bits()
            | Self::FILTERS.bits()
            | Self::OUTPUTS.bits()
            | Self::SCENE_ITEMS.bits()
            | Self::MEDIA_INPUTS.bits()
            | Self::VENDORS.bits()
            | Self::UI.bits();

        /// High-volume. Volume meters of all active inputs, many times a
        /// second.
        const INPUT_VOLUME_METERS = 1 << 16;
        /// High-volume. Active state changes of all inputs.
        const INPUT_ACTIVE_STATE_CHANGED = 1 << 17;
        /// High-volume. Show state changes of all inputs.
        const INPUT_SHOW_STATE_CHANGED = 1 << 18;
        /// High-volume. Scene item transform changes.
        const SCENE_ITEM_TRANSFORM_CHANGED = 1 << 19;
    }
}

// The wire format is the raw integer, in both directions. The derived serde
// support of `bitflags` would write the flag-name string form instead.
impl Serialize for EventSubscription {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for EventSubscription {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bits = u32::deserialize(deserializer)?;
        Self::from_bits(bits)
            .ok_or(crate::Error::UnknownFlags(bits))
            .map_err(serde::de::Error::custom)
    }
}

/// Server-side policy for executing the requests of a batch.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize_repr)]
#[repr(i8)]
pub enum ExecutionType {
    /// Not a request batch.
    None = -1,
    /// Process all requests serially, as fast as possible.
    #[default]
    SerialRealtime = 0,
    /// Process all requests serially, one per rendered frame. Designed to
    /// provide high accuracy for animations.
    SerialFrame = 1,
    /// Process all requests on the thread pool, in no particular order.
    Parallel = 2,
}
