//! Services manager for long-running and background services.
//!
//! Services register with the manager and are started/stopped together.
//! Start order respects [dependencies](Service::dependencies); a service is only
//! started after all of its dependencies.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::jobs::{RefreshScheduler, RefreshSchedulerConfig};
use crate::services::album_picker::{AlbumPicker, AlbumPickerConfig};
use crate::services::http_server::{HttpServerConfig, HttpServerService};

/// Health status of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Result of a service health check.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServiceHealth {
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: None,
        }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            message: Some(message.into()),
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
        }
    }
}

/// A service that can be started, stopped, restarted, and health-checked by the manager.
///
/// Use [tracing] for lifecycle logging and include the service name
/// (e.g. `tracing::info!(service = "http", "Started")`).
///
/// Stateless helpers (e.g. [media_uri](crate::services::album_picker::media_uri))
/// don't implement `Service`.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Unique name for logging and lookup (e.g. "album_picker", "http").
    fn name(&self) -> &str;

    /// Names of services that must be started before this one. Cycles are an error.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Start background tasks. Idempotent allowed.
    async fn start(&self) -> Result<()>;

    /// Stop background tasks and release resources. Idempotent allowed.
    async fn stop(&self) -> Result<()>;

    /// Restart the service: stop then start.
    async fn restart(&self) -> Result<()> {
        self.stop().await?;
        self.start().await
    }

    /// Report current health. Used by the readiness endpoint.
    async fn health(&self) -> Result<ServiceHealth> {
        Ok(ServiceHealth::healthy())
    }
}

/// Pending registration for the builder.
pub enum ServiceRegistration {
    AlbumPicker(AlbumPickerConfig),
    Scheduler(RefreshSchedulerConfig),
    Http(HttpServerConfig),
    Service(Arc<dyn Service>),
}

/// Types that can be added to a [ServicesManagerBuilder] via [add_service](ServicesManagerBuilder::add_service).
pub trait IntoServiceRegistration {
    #[doc(hidden)]
    fn into_registration(self) -> ServiceRegistration;
}

impl IntoServiceRegistration for AlbumPickerConfig {
    fn into_registration(self) -> ServiceRegistration {
        ServiceRegistration::AlbumPicker(self)
    }
}

impl IntoServiceRegistration for RefreshSchedulerConfig {
    fn into_registration(self) -> ServiceRegistration {
        ServiceRegistration::Scheduler(self)
    }
}

impl IntoServiceRegistration for HttpServerConfig {
    fn into_registration(self) -> ServiceRegistration {
        ServiceRegistration::Http(self)
    }
}

impl IntoServiceRegistration for Arc<dyn Service> {
    fn into_registration(self) -> ServiceRegistration {
        ServiceRegistration::Service(self)
    }
}

/// Builder for [ServicesManager]: add services with configs, then [build](ServicesManagerBuilder::build)
/// or [start](ServicesManagerBuilder::start).
///
/// ```ignore
/// let services = ServicesManager::builder()
///     .add_service(AlbumPickerConfig::from(&config))
///     .add_service(RefreshSchedulerConfig { interval: config.refresh_interval() })
///     .add_service(HttpServerConfig { config: config.clone() })
///     .start()
///     .await?;
/// ```
#[derive(Default)]
pub struct ServicesManagerBuilder {
    registrations: Vec<ServiceRegistration>,
}

impl ServicesManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a config-based service or a pre-built [Arc]\[[dyn](Service)\].
    pub fn add_service<T: IntoServiceRegistration>(mut self, t: T) -> Self {
        self.registrations.push(t.into_registration());
        self
    }

    /// Build the manager and register all services. Does not start them.
    pub async fn build(self) -> Result<Arc<ServicesManager>> {
        let manager = Arc::new(ServicesManager::new());
        for reg in self.registrations {
            match reg {
                ServiceRegistration::AlbumPicker(config) => {
                    manager
                        .register_album_picker(Arc::new(AlbumPicker::new(config)))
                        .await;
                }
                ServiceRegistration::Scheduler(config) => {
                    let scheduler = Arc::new(RefreshScheduler::new(manager.clone(), config));
                    manager.register(scheduler).await;
                }
                ServiceRegistration::Http(config) => {
                    let http = Arc::new(HttpServerService::new(manager.clone(), config.config));
                    manager.register(http).await;
                }
                ServiceRegistration::Service(svc) => {
                    manager.register(svc).await;
                }
            }
        }
        Ok(manager)
    }

    /// Build the manager and start every service in dependency order.
    pub async fn start(self) -> Result<Arc<ServicesManager>> {
        let manager = self.build().await?;
        manager.start_all().await?;
        Ok(manager)
    }
}

/// Registry and lifecycle controller for services.
pub struct ServicesManager {
    services: RwLock<HashMap<String, Arc<dyn Service>>>,
    started: RwLock<HashSet<String>>,
    album_picker: RwLock<Option<Arc<AlbumPicker>>>,
}

impl Default for ServicesManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ServicesManager {
    pub fn new() -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
            started: RwLock::new(HashSet::new()),
            album_picker: RwLock::new(None),
        }
    }

    pub fn builder() -> ServicesManagerBuilder {
        ServicesManagerBuilder::new()
    }

    /// Compute start order from dependencies (topological order). Errors on unknown deps or cycles.
    async fn start_order(&self) -> Result<Vec<String>> {
        let guard = self.services.read().await;
        let names: HashSet<String> = guard.keys().cloned().collect();
        let mut deps: HashMap<String, Vec<String>> = HashMap::new();
        for (name, svc) in guard.iter() {
            let d = svc.dependencies();
            for dep in &d {
                if !names.contains(dep) {
                    anyhow::bail!("Service {} depends on {} which is not registered", name, dep);
                }
            }
            deps.insert(name.clone(), d);
        }
        drop(guard);

        // Kahn's algorithm: dependencies first.
        let mut in_degree: HashMap<String, usize> = deps
            .iter()
            .map(|(name, d)| (name.clone(), d.len()))
            .collect();
        let mut dependent_on: HashMap<String, Vec<String>> =
            names.iter().map(|n| (n.clone(), Vec::new())).collect();
        for (name, d) in &deps {
            for dep in d {
                if let Some(list) = dependent_on.get_mut(dep) {
                    list.push(name.clone());
                }
            }
        }
        let mut queue: Vec<String> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| n.clone())
            .collect();
        queue.sort();
        let mut order = Vec::with_capacity(names.len());
        while let Some(n) = queue.pop() {
            if let Some(dependents) = dependent_on.get(&n) {
                for s in dependents {
                    if let Some(deg) = in_degree.get_mut(s) {
                        *deg -= 1;
                        if *deg == 0 {
                            queue.push(s.clone());
                        }
                    }
                }
            }
            order.push(n);
        }
        if order.len() != names.len() {
            anyhow::bail!("Service dependency cycle detected");
        }
        Ok(order)
    }

    /// Register a service. Does not start it. A service with the same name is replaced.
    pub async fn register(&self, service: Arc<dyn Service>) {
        let name = service.name().to_string();
        let mut guard = self.services.write().await;
        if guard.insert(name.clone(), service).is_some() {
            warn!(service = %name, "Service '{}' reregistered, overwriting previous", name);
        } else {
            info!(service = %name, "Service '{}' registered", name);
        }
    }

    /// Register the album picker so [get_album_picker](ServicesManager::get_album_picker) works.
    pub async fn register_album_picker(&self, picker: Arc<AlbumPicker>) {
        *self.album_picker.write().await = Some(picker.clone());
        self.register(picker).await;
    }

    /// Return the album picker if it is registered and currently **started**.
    pub async fn get_album_picker(&self) -> Option<Arc<AlbumPicker>> {
        if !self.started.read().await.contains("album_picker") {
            return None;
        }
        self.album_picker.read().await.clone()
    }

    /// Start all registered services in dependency order.
    pub async fn start_all(&self) -> Result<()> {
        let order = self.start_order().await?;
        for name in &order {
            let svc = self.get(name).await;
            if let Some(s) = svc {
                if let Err(e) = s.start().await {
                    warn!(service = %name, error = %e, "Service '{}' start failed", name);
                    return Err(e).context(format!("failed to start service {}", name));
                }
                self.started.write().await.insert(name.clone());
                info!(service = %name, "Service '{}' started", name);
            }
        }
        Ok(())
    }

    /// Stop all started services in reverse dependency order.
    pub async fn stop_all(&self) -> Result<()> {
        let order = self.start_order().await?;
        for name in order.into_iter().rev() {
            if !self.is_started(&name).await {
                continue;
            }
            if let Some(s) = self.get(&name).await {
                if let Err(e) = s.stop().await {
                    warn!(service = %name, error = %e, "Service '{}' stop failed", name);
                } else {
                    info!(service = %name, "Service '{}' stopped", name);
                }
                self.started.write().await.remove(&name);
            }
        }
        Ok(())
    }

    /// Restart a single service by name. Dependencies are not restarted.
    pub async fn restart_one(&self, name: &str) -> Result<()> {
        let svc = self
            .get(name)
            .await
            .ok_or_else(|| anyhow::anyhow!("Service not found: {}", name))?;
        self.started.write().await.remove(name);
        svc.restart().await?;
        self.started.write().await.insert(name.to_string());
        info!(service = %name, "Service '{}' restarted", name);
        Ok(())
    }

    /// Health of every registered service. A failing health check is reported
    /// as [Unhealthy](HealthStatus::Unhealthy) with the error message.
    pub async fn health_all(&self) -> HashMap<String, ServiceHealth> {
        let mut out = HashMap::new();
        for name in self.names().await {
            if let Some(s) = self.get(&name).await {
                let h = match s.health().await {
                    Ok(h) => h,
                    Err(e) => ServiceHealth::unhealthy(e.to_string()),
                };
                out.insert(name, h);
            }
        }
        out
    }

    /// Whether the given service is currently started.
    pub async fn is_started(&self, name: &str) -> bool {
        self.started.read().await.contains(name)
    }

    /// Get a registered service by name.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.services.read().await.get(name).cloned()
    }

    /// List all registered service names.
    pub async fn names(&self) -> Vec<String> {
        self.services.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recorder {
        name: String,
        deps: Vec<String>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn service(name: &str, deps: &[&str], log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn Service> {
            Arc::new(Self {
                name: name.to_string(),
                deps: deps.iter().map(|d| d.to_string()).collect(),
                log: log.clone(),
            })
        }
    }

    #[async_trait]
    impl Service for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn dependencies(&self) -> Vec<String> {
            self.deps.clone()
        }

        async fn start(&self) -> Result<()> {
            self.log.lock().push(format!("start {}", self.name));
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            self.log.lock().push(format!("stop {}", self.name));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_start_and_stop_follow_dependencies() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let manager = ServicesManager::builder()
            .add_service(Recorder::service("http", &["picker"], &log))
            .add_service(Recorder::service("scheduler", &["picker"], &log))
            .add_service(Recorder::service("picker", &[], &log))
            .start()
            .await
            .unwrap();

        assert!(manager.is_started("http").await);
        assert_eq!(log.lock()[0], "start picker");

        manager.stop_all().await.unwrap();
        let entries = log.lock().clone();
        assert_eq!(entries.len(), 6);
        assert_eq!(entries[5], "stop picker");
        assert!(!manager.is_started("picker").await);
    }

    #[tokio::test]
    async fn test_unknown_dependency_is_an_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let result = ServicesManager::builder()
            .add_service(Recorder::service("http", &["missing"], &log))
            .start()
            .await;
        assert!(result.is_err());
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_dependency_cycle_is_an_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let result = ServicesManager::builder()
            .add_service(Recorder::service("a", &["b"], &log))
            .add_service(Recorder::service("b", &["a"], &log))
            .start()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_album_picker_only_available_when_started() {
        let dir = tempfile::TempDir::new().unwrap();
        let manager = ServicesManager::builder()
            .add_service(AlbumPickerConfig {
                root_path: dir.path().to_path_buf(),
                uri_prefix: "ms://".to_string(),
                media_prefix: "/media".to_string(),
            })
            .build()
            .await
            .unwrap();

        assert!(manager.get_album_picker().await.is_none());
        manager.start_all().await.unwrap();
        assert!(manager.get_album_picker().await.is_some());

        let health = manager.health_all().await;
        assert_eq!(health["album_picker"].status, HealthStatus::Healthy);

        manager.restart_one("album_picker").await.unwrap();
        assert!(manager.get_album_picker().await.is_some());
    }
}
