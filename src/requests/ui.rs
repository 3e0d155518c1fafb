//! Requests related to the user interface.

use serde::Serialize;

use super::RequestType;
use crate::responses::ui as responses;

/// Query whether studio mode is enabled.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct GetStudioModeEnabled;

impl RequestType for GetStudioModeEnabled {
    const NAME: &'static str = "GetStudioModeEnabled";
    type Response = responses::StudioModeEnabled;
}

/// Enable or disable studio mode.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetStudioModeEnabled {
    /// The new state of studio mode.
    pub studio_mode_enabled: bool,
}

impl RequestType for SetStudioModeEnabled {
    const NAME: &'static str = "SetStudioModeEnabled";
    type Response = ();
}
