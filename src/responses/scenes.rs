//! Responses to requests in the scenes category.

use serde::Deserialize;

/// Response to [`GetCurrentProgramScene`].
///
/// [`GetCurrentProgramScene`]: crate::requests::scenes::GetCurrentProgramScene
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentProgramScene {
    /// Name of the scene on program output.
    pub current_program_scene_name: String,
}

/// Response to [`GetCurrentPreviewScene`].
///
/// [`GetCurrentPreviewScene`]: crate::requests::scenes::GetCurrentPreviewScene
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPreviewScene {
    /// Name of the scene on preview.
    pub current_preview_scene_name: String,
}
