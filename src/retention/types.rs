use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Time-bounded exemption of one capture from deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetentionHold {
    pub capture_id: String,
    pub expires_at: DateTime<Utc>,
}

/// A capture file as found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureFile {
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
    pub size_bytes: u64,
}

impl CaptureFile {
    /// File name without its extension, which is the capture identifier.
    pub fn capture_id(&self) -> Option<&str> {
        self.path.file_stem().and_then(|s| s.to_str())
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|s| s.to_str())
    }
}

/// What one sweep cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    /// Deleted because their age exceeded the TTL.
    pub expired: usize,
    /// Deleted oldest-first to get back under the storage limit.
    pub evicted: usize,
    /// Skipped because a live hold protected them.
    pub held: usize,
    /// Per-file I/O failures; the sweep carried on past them.
    pub failed: usize,
    pub remaining_bytes: u64,
}

impl SweepReport {
    pub fn deleted(&self) -> usize {
        self.expired + self.evicted
    }
}
