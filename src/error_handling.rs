//! Error types shared across the crate.
//!
//! Each subsystem owns one enum in [`types`]. The packet classifier and the
//! connection registry have none: their failures are absorbed locally.

pub mod types;

pub use types::{ConfigError, ControllerError, RetentionError, ScriptError, WebError};
