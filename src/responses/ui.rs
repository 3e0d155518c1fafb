//! Responses to requests in the user interface category.

use serde::Deserialize;

/// Response to [`GetStudioModeEnabled`].
///
/// [`GetStudioModeEnabled`]: crate::requests::ui::GetStudioModeEnabled
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioModeEnabled {
    /// Whether studio mode is currently enabled.
    pub studio_mode_enabled: bool,
}
