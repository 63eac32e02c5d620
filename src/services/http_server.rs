//! HTTP server service: binds the Axum app and runs it in a background task.
//!
//! Depends on the album picker. The service builds [AppState](crate::app::AppState)
//! and the router in [start](Service::start) and runs the server until [stop](Service::stop).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::app::{AppState, build_app};
use crate::config::Config;
use crate::services::manager::{Service, ServiceHealth};

/// Configuration for the HTTP server service (port and app config).
#[derive(Clone)]
pub struct HttpServerConfig {
    pub config: Arc<Config>,
}

/// HTTP server service: binds and serves the Axum app in a background task.
pub struct HttpServerService {
    manager: Arc<crate::services::ServicesManager>,
    config: Arc<Config>,
    /// JoinHandle for the server task; set in start(), taken in stop().
    join_handle: parking_lot::RwLock<Option<tokio::task::JoinHandle<Result<()>>>>,
    /// Dropped to trigger server shutdown; set in start(), taken in stop().
    shutdown_tx: parking_lot::RwLock<Option<broadcast::Sender<()>>>,
}

impl HttpServerService {
    pub fn new(manager: Arc<crate::services::ServicesManager>, config: Arc<Config>) -> Self {
        Self {
            manager,
            config,
            join_handle: parking_lot::RwLock::new(None),
            shutdown_tx: parking_lot::RwLock::new(None),
        }
    }
}

#[async_trait]
impl Service for HttpServerService {
    fn name(&self) -> &str {
        "http"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["album_picker".to_string()]
    }

    async fn start(&self) -> Result<()> {
        info!(service = "http", "HTTP server service starting");

        let state = AppState {
            config: self.config.clone(),
            services: self.manager.clone(),
        };

        let app = build_app(state);
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .context("HTTP server: bind failed")?;

        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let mut shutdown_rx = shutdown_tx.subscribe();

        let serve_fut = axum::serve(listener, app);
        let join = tokio::spawn(async move {
            tokio::select! {
                result = serve_fut => result.context("axum::serve"),
                _ = shutdown_rx.recv() => Ok(()),
            }
        });

        *self.join_handle.write() = Some(join);
        *self.shutdown_tx.write() = Some(shutdown_tx);

        info!(service = "http", "Listening on http://{}", addr);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let tx = self.shutdown_tx.write().take();
        let handle = self.join_handle.write().take();
        drop(tx); // closes the channel and unblocks the server task's recv
        if let Some(h) = handle {
            match h.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(service = "http", "HTTP server exited with error: {:#}", e);
                }
                Err(e) => warn!(service = "http", error = %e, "HTTP server task failed"),
            }
        }
        info!(service = "http", "HTTP server service stopped");
        Ok(())
    }

    async fn health(&self) -> Result<ServiceHealth> {
        match self.join_handle.read().as_ref() {
            Some(h) if !h.is_finished() => Ok(ServiceHealth::healthy()),
            Some(_) => Ok(ServiceHealth::unhealthy("server task exited")),
            None => Ok(ServiceHealth::unhealthy("server task not running")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ServicesManager;
    use crate::services::manager::HealthStatus;

    #[tokio::test]
    async fn test_health_follows_server_task() {
        let mut config = Config::from_lookup(|_| None).unwrap();
        config.port = 0;
        let server = HttpServerService::new(Arc::new(ServicesManager::new()), Arc::new(config));

        assert_eq!(server.health().await.unwrap().status, HealthStatus::Unhealthy);

        server.start().await.unwrap();
        assert_eq!(server.health().await.unwrap().status, HealthStatus::Healthy);

        server.stop().await.unwrap();
        assert_eq!(server.health().await.unwrap().status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_health_reports_exited_task() {
        let config = Config::from_lookup(|_| None).unwrap();
        let server = HttpServerService::new(Arc::new(ServicesManager::new()), Arc::new(config));

        let handle = tokio::spawn(async { Err(anyhow::anyhow!("listener closed")) });
        while !handle.is_finished() {
            tokio::task::yield_now().await;
        }
        *server.join_handle.write() = Some(handle);

        let health = server.health().await.unwrap();
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert_eq!(health.message.as_deref(), Some("server task exited"));

        // Stopping logs the server error instead of failing
        server.stop().await.unwrap();
    }
}
