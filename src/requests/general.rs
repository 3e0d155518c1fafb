//! General requests that are not tied to a specific resource.

use serde::Serialize;

use super::RequestType;
use crate::responses::general as responses;

/// Query the server and protocol versions along with the feature lists the
/// server supports.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct GetVersion;

impl RequestType for GetVersion {
    const NAME: &'static str = "GetVersion";
    type Response = responses::Version;
}
