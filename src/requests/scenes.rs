//! Requests related to scenes and the program/preview split.

use serde::Serialize;

use super::RequestType;
use crate::responses::scenes as responses;

/// Query the scene currently on program output.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct GetCurrentProgramScene;

impl RequestType for GetCurrentProgramScene {
    const NAME: &'static str = "GetCurrentProgramScene";
    type Response = responses::CurrentProgramScene;
}

/// Query the scene currently on preview. Only valid while studio mode is
/// enabled.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct GetCurrentPreviewScene;

impl RequestType for GetCurrentPreviewScene {
    const NAME: &'static str = "GetCurrentPreviewScene";
    type Response = responses::CurrentPreviewScene;
}

/// Switch the program output to another scene.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCurrentProgramScene<'a> {
    /// Name of the scene to switch to.
    pub scene_name: &'a str,
}

impl RequestType for SetCurrentProgramScene<'_> {
    const NAME: &'static str = "SetCurrentProgramScene";
    type Response = ();
}

/// Switch the preview to another scene. Only valid while studio mode is
/// enabled.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCurrentPreviewScene<'a> {
    /// Name of the scene to preview.
    pub scene_name: &'a str,
}

impl RequestType for SetCurrentPreviewScene<'_> {
    const NAME: &'static str = "SetCurrentPreviewScene";
    type Response = ();
}
