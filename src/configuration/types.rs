use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// `[capture]` section: the managed capture directory and its retention policy.
#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub directory: PathBuf,
    /// File extension (without the dot) every capture file carries.
    pub extension: String,
    #[serde(deserialize_with = "super::duration::deserialize")]
    pub ttl: Duration,
    /// Maximum aggregate size of the capture directory, 0 disables the limit.
    pub storage_limit_bytes: u64,
    #[serde(deserialize_with = "super::duration::deserialize")]
    pub sweep_interval: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/tmp/trawl/pcaps"),
            extension: String::from("pcap"),
            ttl: Duration::from_secs(5 * 60),
            storage_limit_bytes: 500 * 1024 * 1024,
            sweep_interval: Duration::from_secs(30),
        }
    }
}

/// `[scripting]` section.
#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct ScriptingConfig {
    pub enabled: bool,
    pub timeout_ms: u64,
    /// Admission slots: queued callers, the running script and abandoned
    /// threads still winding down all count against it.
    pub max_concurrent: usize,
    /// Upper bound for `retain()` durations requested by scripts, 0 = no cap.
    pub retention_limit_secs: u64,
    /// Loop iterations after which the engine aborts a script on its own, 0 = no limit.
    pub loop_iteration_limit: u64,
}

impl ScriptingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ScriptingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 5000,
            max_concurrent: 10,
            retention_limit_secs: 3600,
            loop_iteration_limit: 10_000_000,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub channel_capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 4096,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: String::from("0.0.0.0"),
            port: 8899,
        }
    }
}
