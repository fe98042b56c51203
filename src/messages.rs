use serde::{Deserialize, Serialize};

/// Body of a JSON restoration request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RestoreRequest {
    /// Base64 encoded image (PNG, JPEG, ...).
    pub image: String,
}

/// Body of a successful JSON restoration response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RestoreResponse {
    /// Base64 encoded PNG.
    pub enhanced_image: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
