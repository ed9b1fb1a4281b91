pub mod config;
pub mod duration;
pub mod types;

pub use config::Config;
pub use types::{CaptureConfig, IngestConfig, ScriptingConfig, WebConfig};
