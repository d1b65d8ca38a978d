use serde::{Deserialize, Serialize};

/// JSON envelope returned for every failed request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

/// Body of `GET /status`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusResponse {
    pub status: String,
}
