//! Responses to requests in the general category.

use serde::Deserialize;

/// Response to [`GetVersion`].
///
/// [`GetVersion`]: crate::requests::general::GetVersion
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    /// Version of the OBS Studio instance.
    pub obs_version: semver::Version,
    /// Version of the `obs-websocket` plugin.
    pub obs_web_socket_version: semver::Version,
    /// RPC version in use by the session.
    pub rpc_version: u32,
    /// All request discriminators the server accepts.
    pub available_requests: Vec<String>,
    /// Image formats available for screenshot requests.
    pub supported_image_formats: Vec<String>,
    /// Name of the platform the server runs on.
    pub platform: String,
    /// Description of the platform, usually the OS version.
    pub platform_description: String,
}
