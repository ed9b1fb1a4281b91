use std::collections::{HashMap, HashSet};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, error, info, warn};

use super::clock::{add_saturating, Clock, SystemClock};
use super::types::{CaptureFile, RetentionHold, SweepReport};
use crate::configuration::CaptureConfig;
use crate::error_handling::types::RetentionError;

/// Owns the capture directory and the hold map.
///
/// Holds are absolute: [`retain_pcap`](Self::retain_pcap) replaces any previous
/// expiry for the same id, so a shorter duration shortens the hold. A file is
/// protected while a hold exists for its capture id (file stem) or for its full
/// file name and the hold has not expired.
#[derive(Debug)]
pub struct RetentionManager {
    directory: PathBuf,
    extension: String,
    ttl: Duration,
    storage_limit_bytes: u64,
    holds: Mutex<HashMap<String, DateTime<Utc>>>,
    clock: Arc<dyn Clock>,
}

impl RetentionManager {
    pub fn new(config: &CaptureConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CaptureConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            directory: config.directory.clone(),
            extension: config.extension.trim_start_matches('.').to_string(),
            ttl: config.ttl,
            storage_limit_bytes: config.storage_limit_bytes,
            holds: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn storage_limit_bytes(&self) -> u64 {
        self.storage_limit_bytes
    }

    /// Creates the capture directory if it does not exist yet.
    pub fn ensure_directory(&self) -> Result<(), RetentionError> {
        fs::create_dir_all(&self.directory).map_err(|e| {
            error!(
                "Failed to create capture directory {}: {}",
                self.directory.display(),
                e
            );
            RetentionError::IoError(e)
        })
    }

    /// Where the capture for `id` lives: `<directory>/<id>.<extension>`.
    pub fn capture_path(&self, id: &str) -> PathBuf {
        self.directory.join(format!("{}.{}", id, self.extension))
    }

    fn holds(&self) -> MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.holds.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Holds `id` until `now + duration`, replacing any earlier hold.
    pub fn retain_pcap(&self, id: &str, duration: Duration) -> DateTime<Utc> {
        let expires_at = add_saturating(self.clock.now(), duration);
        self.holds().insert(id.to_string(), expires_at);
        debug!(
            "Capture {} retained for {:?} (until {})",
            id,
            duration,
            expires_at.to_rfc3339()
        );
        expires_at
    }

    /// True while a hold for `id` exists and has not expired. An expired hold
    /// found here is dropped from the map.
    pub fn is_retained(&self, id: &str) -> bool {
        let now = self.clock.now();
        let mut holds = self.holds();
        match holds.get(id) {
            Some(expires_at) if now < *expires_at => true,
            Some(_) => {
                holds.remove(id);
                debug!("Hold on capture {} expired", id);
                false
            }
            None => false,
        }
    }

    /// Removes every hold whose expiry has passed. Returns how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut holds = self.holds();
        let before = holds.len();
        holds.retain(|_, expires_at| now < *expires_at);
        let removed = before - holds.len();
        if removed > 0 {
            debug!("Dropped {} expired holds", removed);
        }
        removed
    }

    /// Live holds, soonest expiry first.
    pub fn retained_captures(&self) -> Vec<RetentionHold> {
        let now = self.clock.now();
        let mut live: Vec<RetentionHold> = self
            .holds()
            .iter()
            .filter(|(_, expires_at)| now < **expires_at)
            .map(|(id, expires_at)| RetentionHold {
                capture_id: id.clone(),
                expires_at: *expires_at,
            })
            .collect();
        live.sort_by(|a, b| {
            a.expires_at
                .cmp(&b.expires_at)
                .then_with(|| a.capture_id.cmp(&b.capture_id))
        });
        live
    }

    fn live_hold_ids(&self, now: DateTime<Utc>) -> HashSet<String> {
        self.holds()
            .iter()
            .filter(|(_, expires_at)| now < **expires_at)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn is_capture(&self, path: &Path) -> bool {
        path.extension() == Some(OsStr::new(&self.extension))
    }

    /// Scans the directory. Entries that cannot be inspected are logged and
    /// counted in the second element.
    fn scan(&self) -> Result<(Vec<CaptureFile>, usize), RetentionError> {
        let entries = fs::read_dir(&self.directory)
            .map_err(|e| RetentionError::DirectoryUnreadable(self.directory.clone(), e))?;

        let mut files = Vec::new();
        let mut failed = 0;
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Failed to read entry in {}: {}", self.directory.display(), e);
                    failed += 1;
                    continue;
                }
            };
            let path = entry.path();
            if !self.is_capture(&path) {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("Failed to stat {}: {}", path.display(), e);
                    failed += 1;
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            let modified = match metadata.modified() {
                Ok(modified) => DateTime::<Utc>::from(modified),
                Err(e) => {
                    warn!("No modification time for {}: {}", path.display(), e);
                    failed += 1;
                    continue;
                }
            };
            files.push(CaptureFile {
                path,
                modified,
                size_bytes: metadata.len(),
            });
        }
        Ok((files, failed))
    }

    /// Aggregate size of the capture files in bytes.
    pub fn storage_usage(&self) -> Result<u64, RetentionError> {
        let (files, _) = self.scan()?;
        Ok(files.iter().map(|f| f.size_bytes).sum())
    }

    /// One retention pass over the capture directory.
    ///
    /// Files older than the TTL are deleted unless held. Then, with a non-zero
    /// storage limit, unheld files are deleted oldest-first until the directory
    /// fits the limit. Per-file failures are logged and counted; only an
    /// unreadable directory fails the pass.
    pub fn sweep(&self) -> Result<SweepReport, RetentionError> {
        let now = self.clock.now();
        let (files, failed) = self.scan()?;
        let held_ids = self.live_hold_ids(now);
        let ttl = TimeDelta::from_std(self.ttl).unwrap_or(TimeDelta::MAX);

        let mut report = SweepReport {
            scanned: files.len(),
            failed,
            ..Default::default()
        };

        let is_held = |file: &CaptureFile| {
            file.capture_id().is_some_and(|id| held_ids.contains(id))
                || file.file_name().is_some_and(|name| held_ids.contains(name))
        };

        let mut survivors = Vec::with_capacity(files.len());
        for file in files {
            if is_held(&file) {
                report.held += 1;
                survivors.push((file, true));
                continue;
            }
            if now.signed_duration_since(file.modified) > ttl {
                match fs::remove_file(&file.path) {
                    Ok(()) => {
                        debug!("Removed expired capture {}", file.path.display());
                        report.expired += 1;
                    }
                    Err(e) => {
                        error!("Failed to remove expired capture {}: {}", file.path.display(), e);
                        report.failed += 1;
                        survivors.push((file, false));
                    }
                }
            } else {
                survivors.push((file, false));
            }
        }

        let mut total: u64 = survivors.iter().map(|(f, _)| f.size_bytes).sum();
        if self.storage_limit_bytes > 0 && total > self.storage_limit_bytes {
            survivors.sort_by(|(a, _), (b, _)| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
            for (file, held) in &survivors {
                if total <= self.storage_limit_bytes {
                    break;
                }
                if *held {
                    continue;
                }
                match fs::remove_file(&file.path) {
                    Ok(()) => {
                        debug!(
                            "Evicted capture {} ({} bytes) to honour the storage limit",
                            file.path.display(),
                            file.size_bytes
                        );
                        total -= file.size_bytes;
                        report.evicted += 1;
                    }
                    Err(e) => {
                        error!("Failed to evict capture {}: {}", file.path.display(), e);
                        report.failed += 1;
                    }
                }
            }
            if total > self.storage_limit_bytes {
                warn!(
                    "Capture directory still holds {} bytes over the {} byte limit after eviction",
                    total - self.storage_limit_bytes,
                    self.storage_limit_bytes
                );
            }
        }
        report.remaining_bytes = total;

        if report.deleted() > 0 || report.failed > 0 {
            info!(
                "Sweep of {}: {} expired, {} evicted, {} held, {} failed",
                self.directory.display(),
                report.expired,
                report.evicted,
                report.held,
                report.failed
            );
        }
        Ok(report)
    }
}
