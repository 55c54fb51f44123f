use serde::{Deserialize, Serialize};

/// A remote object held by the object store. `public_id` is the handle used to
/// delete it; `url` is what gets stored on the user record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaAsset {
    pub public_id: String,
    pub url: String,
}
