//! Data model of reconstructed request/response exchanges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pairing state of a [`Connection`].
///
/// `Complete` is terminal: once reached, the entry never goes back to a
/// half state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    RequestOnly,
    ResponseOnly,
    Complete,
}

/// One logical request/response exchange, keyed by its correlation key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub protocol: String,
    pub source: String,
    pub target: String,
    /// Capture time of whichever side was seen first.
    pub timestamp: DateTime<Utc>,
    pub request: Option<String>,
    pub response: Option<String>,
    pub status: ConnectionStatus,
}

impl Connection {
    /// Status implied by which payloads are present.
    pub fn derived_status(&self) -> ConnectionStatus {
        match (&self.request, &self.response) {
            (Some(_), Some(_)) => ConnectionStatus::Complete,
            (None, Some(_)) => ConnectionStatus::ResponseOnly,
            _ => ConnectionStatus::RequestOnly,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == ConnectionStatus::Complete
    }
}

/// Which side of an exchange a half-connection observation is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HalfConnectionKind {
    Request,
    Response,
}

/// Record of a side that could not be paired when it arrived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HalfConnection {
    pub connection_id: String,
    pub kind: HalfConnectionKind,
    pub timestamp: DateTime<Utc>,
    pub data: Option<String>,
}

/// Snapshot of how many entries the registry holds per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub request_only: usize,
    pub response_only: usize,
    pub complete: usize,
    pub half_connections: usize,
}
