use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::configuration::config::Config;
use crate::connection_tracking::ConnectionRegistry;
use crate::error_handling::types::*;
use crate::packet_classification::{CapturedPacket, PacketProcessor};
use crate::retention::{spawn_sweeper, RetentionManager};
use crate::scripting::ScriptSandbox;
use crate::web_interface::WebServer;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns one capture worker: its registry, retention manager, sandbox and the
/// background tasks tying them together.
pub struct Controller {
    pub config: Config,
    registry: Arc<ConnectionRegistry>,
    retention: Arc<RetentionManager>,
    sandbox: Arc<ScriptSandbox>,
    packet_tx: Option<mpsc::Sender<CapturedPacket>>,
    packet_rx: Option<mpsc::Receiver<CapturedPacket>>,
    shutdown_tx: watch::Sender<bool>,
    processor_task: Option<JoinHandle<()>>,
    sweeper_task: Option<JoinHandle<()>>,
    web_task: Option<JoinHandle<()>>,
}

impl Controller {
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        config.validate()?;

        let retention = Arc::new(RetentionManager::new(&config.capture));
        retention.ensure_directory()?;
        info!(
            "Managing captures in {} (ttl {:?}, limit {} bytes)",
            retention.directory().display(),
            config.capture.ttl,
            config.capture.storage_limit_bytes
        );

        let registry = Arc::new(ConnectionRegistry::new());
        let sandbox = Arc::new(ScriptSandbox::new(
            config.scripting.clone(),
            retention.clone(),
        ));
        let (packet_tx, packet_rx) = mpsc::channel(config.ingest.channel_capacity);
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            registry,
            retention,
            sandbox,
            packet_tx: Some(packet_tx),
            packet_rx: Some(packet_rx),
            shutdown_tx,
            processor_task: None,
            sweeper_task: None,
            web_task: None,
        })
    }

    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    pub fn retention(&self) -> Arc<RetentionManager> {
        self.retention.clone()
    }

    pub fn sandbox(&self) -> Arc<ScriptSandbox> {
        self.sandbox.clone()
    }

    /// Handle for capture sources. `None` once the controller is shut down.
    pub fn packet_sender(&self) -> Option<mpsc::Sender<CapturedPacket>> {
        self.packet_tx.clone()
    }

    /// Spawns the packet processor, the retention sweeper and, if enabled,
    /// the web interface.
    pub fn start(&mut self) -> Result<(), ControllerError> {
        let packet_rx = self.packet_rx.take().ok_or_else(|| {
            ControllerError::InitializationFailed("controller already started".to_string())
        })?;

        let processor = PacketProcessor::new(self.registry.clone());
        self.processor_task = Some(tokio::spawn(processor.run(packet_rx)));

        self.sweeper_task = Some(spawn_sweeper(
            self.retention.clone(),
            self.config.capture.sweep_interval,
            self.shutdown_tx.subscribe(),
        ));

        if self.config.web.enabled {
            let server = WebServer::new(
                self.config.web.clone(),
                self.registry.clone(),
                self.retention.clone(),
                self.sandbox.clone(),
            );
            server.address()?;
            self.web_task = Some(tokio::spawn(async move {
                if let Err(e) = server.start().await {
                    error!("Web interface stopped: {}", e);
                }
            }));
        } else {
            info!("Web interface disabled");
        }

        info!("Controller started");
        Ok(())
    }

    /// Starts everything and runs until Ctrl-C.
    pub async fn run(&mut self) -> Result<(), ControllerError> {
        self.start()?;
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupt received, shutting down"),
            Err(e) => warn!("Unable to listen for the interrupt signal: {}", e),
        }
        self.shutdown().await;
        Ok(())
    }

    /// Stops the background tasks. Packets already queued are drained first.
    pub async fn shutdown(&mut self) {
        info!("Shutting down controller");
        let _ = self.shutdown_tx.send(true);
        self.packet_tx = None;

        if let Some(web) = self.web_task.take() {
            web.abort();
        }
        if let Some(sweeper) = self.sweeper_task.take() {
            if let Err(e) = sweeper.await {
                warn!("Sweeper task ended abnormally: {}", e);
            }
        }
        if let Some(mut processor) = self.processor_task.take() {
            match tokio::time::timeout(DRAIN_TIMEOUT, &mut processor).await {
                Ok(Ok(())) => debug!("Packet processor drained"),
                Ok(Err(e)) => warn!("Packet processor ended abnormally: {}", e),
                Err(_) => {
                    warn!("Capture sources still hold the packet channel, aborting processor");
                    processor.abort();
                }
            }
        }
        let stats = self.registry.stats();
        info!(
            "Controller stopped ({} complete, {} request-only, {} response-only)",
            stats.complete, stats.request_only, stats.response_only
        );
    }
}
