use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use log::{error, info, warn};
use tokio::net::TcpListener;
use warp::{Filter, Rejection, Reply};

use super::routes::*;
use crate::configuration::WebConfig;
use crate::connection_tracking::ConnectionRegistry;
use crate::error_handling::types::WebError;
use crate::retention::RetentionManager;
use crate::scripting::ScriptSandbox;

/// Web server for the query API and the dashboard
pub struct WebServer {
    config: WebConfig,
    registry: Arc<ConnectionRegistry>,
    retention: Arc<RetentionManager>,
    sandbox: Arc<ScriptSandbox>,
}

impl WebServer {
    pub fn new(
        config: WebConfig,
        registry: Arc<ConnectionRegistry>,
        retention: Arc<RetentionManager>,
        sandbox: Arc<ScriptSandbox>,
    ) -> Self {
        Self {
            config,
            registry,
            retention,
            sandbox,
        }
    }

    pub fn address(&self) -> Result<SocketAddr, WebError> {
        let ip: IpAddr = self.config.bind_address.parse().map_err(|e| {
            WebError::BindFailed(format!(
                "invalid bind address '{}': {}",
                self.config.bind_address, e
            ))
        })?;
        Ok(SocketAddr::new(ip, self.config.port))
    }

    pub fn routes(&self) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
        dashboard_route()
            .or(static_route())
            .or(half_connections_route(self.registry.clone()))
            .or(connection_stats_route(self.registry.clone()))
            .or(connections_route(self.registry.clone()))
            .or(retention_route(self.retention.clone()))
            .or(execute_script_route(self.sandbox.clone()))
    }

    /// Binds the configured address. An occupied port surfaces here as an
    /// error instead of a panic inside warp.
    pub async fn bind(&self) -> Result<TcpListener, WebError> {
        let addr = self.address()?;
        TcpListener::bind(addr).await.map_err(|e| {
            error!("Unable to bind web interface on {}: {}", addr, e);
            WebError::BindFailed(format!("{}: {}", addr, e))
        })
    }

    /// Serves on an already bound listener until the task running it is dropped.
    pub async fn serve(&self, listener: TcpListener) {
        match listener.local_addr() {
            Ok(addr) => info!("Web interface listening on http://{}", addr),
            Err(e) => warn!("Web interface listening on an unknown address: {}", e),
        }
        warp::serve(self.routes()).incoming(listener).run().await;
    }

    pub async fn start(&self) -> Result<(), WebError> {
        let listener = self.bind().await?;
        self.serve(listener).await;
        Ok(())
    }
}
