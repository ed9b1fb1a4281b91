use serde::{Deserialize, Serialize};

use crate::retention::RetentionHold;

/// API error payload
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Body of `POST /scripts/execute`.
#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub script: String,
}

/// Body of `GET /retention`.
#[derive(Debug, Serialize)]
pub struct RetentionResponse {
    pub holds: Vec<RetentionHold>,
    /// `None` when the capture directory could not be read.
    pub storage_usage_bytes: Option<u64>,
    pub storage_limit_bytes: u64,
    pub ttl_secs: u64,
}
