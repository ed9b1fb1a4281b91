//! Request/response pairing.
//!
//! Classified packets are paired here into [`types::Connection`] records. The
//! [`connection_registry::ConnectionRegistry`] owns all pairing state and is
//! shared with the query API.

pub mod connection_registry;
pub mod types;

pub use connection_registry::ConnectionRegistry;
pub use types::{Connection, ConnectionStatus, HalfConnection, HalfConnectionKind, RegistryStats};
