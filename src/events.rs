//! Server-pushed events and the registry trait for their typed payloads.
//!
//! The engine treats event payloads as opaque until a subscriber asks for a
//! concrete type: [`RawEvent`] is what travels through the fan-out channel,
//! and [`EventType`] implementations describe how a discriminator's data
//! field decodes. Subscription streams are created through
//! [`Client::events`], [`Client::wait_for`] and [`Client::events_by_name`].
//!
//! [`Client::events`]: crate::Client::events
//! [`Client::wait_for`]: crate::Client::wait_for
//! [`Client::events_by_name`]: crate::Client::events_by_name

use serde::{de::DeserializeOwned, Deserialize};

use crate::requests::EventSubscription;

/// A typed event payload pushed by the server.
///
/// Like [`RequestType`], the trait is open for downstream crates to register
/// event shapes this library doesn't ship.
///
/// [`RequestType`]: crate::requests::RequestType
pub trait EventType: DeserializeOwned + Send + 'static {
    /// The event's discriminator, as spelled on the wire.
    const NAME: &'static str;
}

/// An event as it arrives on the wire, with its payload still undecoded.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    /// Discriminator naming the concrete event.
    pub event_type: String,
    /// The subscription category that caused this event to be delivered.
    pub event_intent: EventSubscription,
    /// The event's payload, decodable through a matching [`EventType`].
    #[serde(default)]
    pub event_data: serde_json::Value,
}

/// Errors delivered through an event subscription stream.
///
/// These affect only the subscriber that observes them; other subscriptions
/// and the session itself continue undisturbed.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EventStreamError {
    /// An event matched the subscription but its payload did not decode into
    /// the subscribed shape.
    #[error("failed to decode the event payload")]
    Decode(#[source] serde_json::Error),
    /// The subscriber fell behind the fan-out channel and missed events. The
    /// stream ends after yielding this error.
    #[error("subscriber lagged behind, missing {0} events")]
    Lagged(u64),
}

/// The scene on program output changed.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentProgramSceneChanged {
    /// Name of the scene now on program.
    pub scene_name: String,
}

impl EventType for CurrentProgramSceneChanged {
    const NAME: &'static str = "CurrentProgramSceneChanged";
}

/// The scene on preview changed. Only delivered while studio mode is
/// enabled.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPreviewSceneChanged {
    /// Name of the scene now on preview.
    pub scene_name: String,
}

impl EventType for CurrentPreviewSceneChanged {
    const NAME: &'static str = "CurrentPreviewSceneChanged";
}

/// Studio mode was enabled or disabled.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioModeStateChanged {
    /// The new state of studio mode.
    pub studio_mode_enabled: bool,
}

impl EventType for StudioModeStateChanged {
    const NAME: &'static str = "StudioModeStateChanged";
}
