//! HTTP query API.
//!
//! - `GET /connections?half=true|false`: connection records, complete only by default
//! - `GET /connections/half`: unpaired half-connection observations
//! - `GET /connections/stats`: entry counts per status
//! - `GET /retention`: live holds and storage usage
//! - `POST /scripts/execute`: run a script in the sandbox
//! - `GET /`: embedded dashboard

pub mod routes;
pub mod types;
pub mod web_server;

pub use types::ApiError;
pub use web_server::WebServer;
