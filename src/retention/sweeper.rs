use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::retention_manager::RetentionManager;
use super::types::SweepReport;

/// Starts the periodic retention task.
///
/// Every `period` the task drops expired holds and sweeps the capture
/// directory on the blocking pool, off the packet path. It exits once
/// `shutdown` carries `true` or its sender is dropped.
pub fn spawn_sweeper(
    manager: Arc<RetentionManager>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Retention sweeper started on {} (every {:?}, ttl {:?})",
            manager.directory().display(),
            period,
            manager.ttl()
        );
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    run_cycle(manager.clone()).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Retention sweeper stopped");
    })
}

/// One housekeeping cycle. A failed cycle is logged and retried on the next tick.
pub async fn run_cycle(manager: Arc<RetentionManager>) -> Option<SweepReport> {
    let result = tokio::task::spawn_blocking(move || {
        manager.cleanup_expired();
        manager.sweep()
    })
    .await;

    match result {
        Ok(Ok(report)) => {
            debug!("Sweep finished: {:?}", report);
            Some(report)
        }
        Ok(Err(e)) => {
            warn!("Sweep cycle aborted: {}", e);
            None
        }
        Err(e) => {
            error!("Sweep task failed: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::CaptureConfig;
    use crate::retention::clock::ManualClock;
    use chrono::Utc;
    use std::fs;
    use tempfile::TempDir;

    fn manager(dir: &TempDir, clock: Arc<ManualClock>) -> Arc<RetentionManager> {
        let config = CaptureConfig {
            directory: dir.path().to_path_buf(),
            ttl: Duration::from_secs(300),
            ..Default::default()
        };
        Arc::new(RetentionManager::with_clock(&config, clock))
    }

    #[tokio::test]
    async fn test_run_cycle_sweeps_and_cleans_holds() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let manager = manager(&dir, clock.clone());
        let path = manager.capture_path("old");
        fs::write(&path, b"data").unwrap();
        manager.retain_pcap("other", Duration::from_secs(1));

        clock.advance(Duration::from_secs(600));
        let report = run_cycle(manager.clone()).await.unwrap();

        assert_eq!(report.expired, 1);
        assert!(!path.exists());
        assert!(manager.retained_captures().is_empty());
    }

    #[tokio::test]
    async fn test_run_cycle_survives_missing_directory() {
        let dir = TempDir::new().unwrap();
        let config = CaptureConfig {
            directory: dir.path().join("missing"),
            ..Default::default()
        };
        let manager = Arc::new(RetentionManager::new(&config));
        assert!(run_cycle(manager).await.is_none());
    }

    #[tokio::test]
    async fn test_sweeper_runs_until_shutdown() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let manager = manager(&dir, clock.clone());
        let path = manager.capture_path("stale");
        fs::write(&path, b"data").unwrap();
        clock.advance(Duration::from_secs(600));

        let (tx, rx) = watch::channel(false);
        let handle = spawn_sweeper(manager, Duration::from_millis(10), rx);

        let mut waited = 0;
        while path.exists() && waited < 200 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += 1;
        }
        assert!(!path.exists());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
