//! Main runtime orchestration.
//!
//! The runtime wires the serving node together:
//! - Start order: segment storage → catalog → cache and executor → preload → eviction task
//! - Shutdown order: eviction task → cache → catalog → storage
//!
//! Lifecycle requests reach the executor through [`Runtime::dispatch`],
//! which runs each command on the blocking pool.

use crate::cache::controller::CacheController;
use crate::catalog::manifest::CatalogManifest;
use crate::catalog::memory::MemoryCatalog;
use crate::commands::{
    CommandEnv, CommandExecutor, CommandKind, CommandOutcome, LifecycleRequest, RequestContext,
};
use crate::core::config::Config;
use crate::ops::audit::AuditLog;
use crate::ops::failpoints::FailPoints;
use crate::ops::observability::{HealthProbe, HealthStatus, TesseraMetrics};
use crate::storage::segment_store::{FileSegmentStore, SegmentLoader};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Component health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentHealth {
    /// Component is starting.
    Starting,
    /// Component is healthy and operational.
    Healthy,
    /// Component is degraded but functional.
    Degraded,
    /// Component has failed.
    Failed,
    /// Component is stopping.
    Stopping,
    /// Component has stopped.
    Stopped,
}

/// Health status aggregated from all components.
#[derive(Debug, Clone)]
pub struct RuntimeHealth {
    /// Segment storage health.
    pub storage: ComponentHealth,
    /// Catalog health. Degraded when no manifest was found.
    pub catalog: ComponentHealth,
    /// Cache and executor health.
    pub cache: ComponentHealth,
    /// Background eviction health. Degraded when eviction is disabled.
    pub eviction: ComponentHealth,
}

impl Default for RuntimeHealth {
    fn default() -> Self {
        Self {
            storage: ComponentHealth::Starting,
            catalog: ComponentHealth::Starting,
            cache: ComponentHealth::Starting,
            eviction: ComponentHealth::Starting,
        }
    }
}

impl RuntimeHealth {
    /// Check if the runtime is ready to serve requests.
    pub fn is_ready(&self) -> bool {
        matches!(
            (self.storage, self.catalog, self.cache, self.eviction),
            (
                ComponentHealth::Healthy,
                ComponentHealth::Healthy | ComponentHealth::Degraded,
                ComponentHealth::Healthy,
                ComponentHealth::Healthy | ComponentHealth::Degraded
            )
        )
    }

    /// Check if the runtime is alive (not failed).
    pub fn is_alive(&self) -> bool {
        ![self.storage, self.catalog, self.cache, self.eviction].contains(&ComponentHealth::Failed)
    }
}

/// Tessera runtime holding all component handles.
pub struct Runtime {
    config: Arc<Config>,
    storage_dir: PathBuf,

    loader: Option<Arc<dyn SegmentLoader>>,
    catalog: Option<Arc<MemoryCatalog>>,
    cache: Option<Arc<CacheController>>,
    executor: Option<CommandExecutor>,

    failpoints: Arc<FailPoints>,
    audit: Arc<AuditLog>,
    metrics: Arc<TesseraMetrics>,
    probe: Arc<HealthProbe>,
    health: RuntimeHealth,

    running: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    eviction_handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("storage_dir", &self.storage_dir)
            .field("health", &self.health)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Create a new runtime with the given configuration.
    pub fn new(config: Config) -> Result<Self> {
        config.validate().context("invalid configuration")?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let storage_dir = PathBuf::from(&config.paths.storage_dir);
        let audit = Arc::new(AuditLog::with_capacity(config.telemetry.audit_capacity));
        let probe = Arc::new(HealthProbe::new());
        probe.set_unhealthy("starting");

        Ok(Self {
            config: Arc::new(config),
            storage_dir,
            loader: None,
            catalog: None,
            cache: None,
            executor: None,
            failpoints: Arc::new(FailPoints::new()),
            audit,
            metrics: Arc::new(TesseraMetrics::new()),
            probe,
            health: RuntimeHealth::default(),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            shutdown_rx,
            eviction_handle: None,
        })
    }

    /// Serve segments from `loader` instead of the storage directory.
    pub fn with_loader(mut self, loader: Arc<dyn SegmentLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Use `catalog` instead of reading the catalog manifest.
    pub fn with_catalog(mut self, catalog: Arc<MemoryCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage_dir(&self) -> &PathBuf {
        &self.storage_dir
    }

    /// The catalog (if initialized).
    pub fn catalog(&self) -> Option<&Arc<MemoryCatalog>> {
        self.catalog.as_ref()
    }

    /// The cache controller (if initialized).
    pub fn cache(&self) -> Option<&Arc<CacheController>> {
        self.cache.as_ref()
    }

    /// The command executor (if initialized).
    pub fn executor(&self) -> Option<&CommandExecutor> {
        self.executor.as_ref()
    }

    pub fn failpoints(&self) -> &Arc<FailPoints> {
        &self.failpoints
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn metrics(&self) -> &Arc<TesseraMetrics> {
        &self.metrics
    }

    /// Get the current health status.
    pub fn health(&self) -> &RuntimeHealth {
        &self.health
    }

    /// Probe-style health summary.
    pub fn health_status(&self) -> HealthStatus {
        self.probe.status()
    }

    /// Check if the runtime is ready to serve requests.
    pub fn is_ready(&self) -> bool {
        self.health.is_ready()
    }

    /// Check if the runtime is alive.
    pub fn is_alive(&self) -> bool {
        self.health.is_alive()
    }

    /// Check if the runtime is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Get a shutdown receiver for graceful shutdown coordination.
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Initialize and start all runtime components.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!(
            storage_dir = %self.storage_dir.display(),
            "starting Tessera runtime"
        );

        self.init_storage()?;
        self.init_catalog()?;
        self.init_cache()?;
        self.preload()?;
        self.start_eviction();

        self.running.store(true, Ordering::Release);
        self.probe.set_healthy();
        tracing::info!("Tessera runtime started");
        Ok(())
    }

    fn init_storage(&mut self) -> Result<()> {
        tracing::debug!("initializing segment storage");

        if self.loader.is_none() {
            let store = FileSegmentStore::new(self.storage_dir.clone());
            store
                .initialize()
                .context("failed to initialize segment storage")?;
            self.loader = Some(Arc::new(store));
        }
        self.health.storage = ComponentHealth::Healthy;

        tracing::info!(
            storage_dir = %self.storage_dir.display(),
            "segment storage initialized"
        );
        Ok(())
    }

    fn init_catalog(&mut self) -> Result<()> {
        tracing::debug!("initializing catalog");

        if self.catalog.is_some() {
            self.health.catalog = ComponentHealth::Healthy;
            return Ok(());
        }

        let manifest_path = self.config.paths.catalog_manifest_path();
        let catalog = if manifest_path.exists() {
            let catalog = CatalogManifest::from_file(&manifest_path)?
                .into_catalog()
                .with_context(|| format!("invalid catalog manifest: {}", manifest_path.display()))?;
            self.health.catalog = ComponentHealth::Healthy;
            catalog
        } else {
            tracing::warn!(
                manifest = %manifest_path.display(),
                "catalog manifest not found; starting with an empty catalog"
            );
            self.health.catalog = ComponentHealth::Degraded;
            MemoryCatalog::new()
        };

        tracing::info!(
            collections = catalog.root_collections().len(),
            segments = catalog.segment_count(),
            "catalog initialized"
        );
        self.catalog = Some(Arc::new(catalog));
        Ok(())
    }

    fn init_cache(&mut self) -> Result<()> {
        tracing::debug!("initializing cache");

        let loader = self
            .loader
            .clone()
            .context("segment storage is not initialized")?;
        let catalog = self
            .catalog
            .clone()
            .context("catalog is not initialized")?;

        let cache = Arc::new(CacheController::new(loader, self.config.cache.capacity_bytes));
        let env = CommandEnv::from_catalog(catalog, cache.clone())
            .with_failpoints(self.failpoints.clone());
        let executor = CommandExecutor::new(env)
            .with_audit(self.audit.clone())
            .with_metrics(self.metrics.clone());

        self.cache = Some(cache);
        self.executor = Some(executor);
        self.health.cache = ComponentHealth::Healthy;

        tracing::info!(
            capacity_bytes = self.config.cache.capacity_bytes,
            "cache initialized"
        );
        Ok(())
    }

    fn preload(&self) -> Result<()> {
        let executor = self
            .executor
            .clone()
            .context("executor is not initialized")?;

        for (index, entry) in self.config.preload.collections.iter().enumerate() {
            let context = RequestContext::with_request_id(format!("preload-{index}"))
                .with_client("preload");
            let mut command = LifecycleRequest::new(
                CommandKind::LoadCollection,
                entry.name.clone(),
                entry.partition_tags.clone(),
            )
            .into_command(context);
            let outcome = executor.execute(command.as_mut());

            if outcome.is_ok() {
                tracing::info!(collection = %entry.name, "preloaded collection");
            } else if self.config.preload.fail_on_error {
                anyhow::bail!(
                    "preload of collection {} failed: {} {}",
                    entry.name,
                    outcome.status.code.as_str(),
                    outcome.status.message
                );
            } else {
                tracing::warn!(
                    collection = %entry.name,
                    code = outcome.status.code.as_str(),
                    error = %outcome.status.message,
                    "preload failed; continuing"
                );
            }
        }
        Ok(())
    }

    fn start_eviction(&mut self) {
        let Some(cache) = self.cache.clone() else {
            return;
        };
        if !self.config.cache.eviction_enabled {
            tracing::info!("background eviction disabled");
            self.health.eviction = ComponentHealth::Degraded;
            return;
        }

        let period = Duration::from_millis(self.config.cache.eviction_interval_ms);
        let metrics = self.metrics.clone();
        let mut shutdown_rx = self.shutdown_rx.clone();

        self.eviction_handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = cache.evict();
                        if !report.is_empty() {
                            tracing::debug!(
                                evicted = report.evicted.len(),
                                freed_bytes = report.freed_bytes,
                                skipped_held = report.skipped_held,
                                skipped_in_use = report.skipped_in_use,
                                skipped_locked = report.skipped_locked,
                                "eviction pass"
                            );
                        }
                        metrics.record_cache_stats(&cache.stats());
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("eviction task stopped");
        }));
        self.health.eviction = ComponentHealth::Healthy;
        tracing::info!(interval_ms = period.as_millis() as u64, "background eviction started");
    }

    /// Run one lifecycle request on the blocking pool.
    pub async fn dispatch(&self, request: LifecycleRequest) -> Result<CommandOutcome> {
        self.dispatch_with(request, RequestContext::new()).await
    }

    /// Run one lifecycle request with an explicit request context.
    pub async fn dispatch_with(
        &self,
        request: LifecycleRequest,
        context: RequestContext,
    ) -> Result<CommandOutcome> {
        let executor = self
            .executor
            .clone()
            .context("runtime is not started")?;
        tokio::task::spawn_blocking(move || {
            let mut command = request.into_command(context);
            executor.execute(command.as_mut())
        })
        .await
        .context("command task failed")
    }

    /// Trigger graceful shutdown.
    pub fn shutdown(&self) {
        tracing::info!("shutdown requested");
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for shutdown signal.
    pub async fn wait_for_shutdown(&mut self) {
        let mut rx = self.shutdown_rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    /// Run the runtime until shutdown.
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;

        let mut shutdown_rx = self.shutdown_rx.clone();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("shutdown signal received (SIGINT)");
            }
            _ = async {
                while !*shutdown_rx.borrow() {
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
            } => {
                tracing::info!("shutdown requested by component");
            }
        }

        self.stop().await
    }

    /// Stop all runtime components in reverse start order.
    pub async fn stop(&mut self) -> Result<()> {
        tracing::info!("stopping Tessera runtime");
        self.running.store(false, Ordering::Release);
        self.probe.set_unhealthy("stopping");
        let _ = self.shutdown_tx.send(true);

        self.stop_eviction().await;

        self.health.cache = ComponentHealth::Stopping;
        if let Some(cache) = self.cache.as_ref() {
            let stats = cache.stats();
            self.metrics.record_cache_stats(&stats);
            tracing::info!(
                resident_segments = stats.resident_segments,
                usage_bytes = stats.usage_bytes,
                "cache stopped"
            );
        }
        self.executor = None;
        self.health.cache = ComponentHealth::Stopped;
        self.health.catalog = ComponentHealth::Stopped;
        self.health.storage = ComponentHealth::Stopped;

        self.probe.set_unhealthy("stopped");
        tracing::info!("Tessera runtime stopped");
        Ok(())
    }

    async fn stop_eviction(&mut self) {
        self.health.eviction = ComponentHealth::Stopping;
        if let Some(handle) = self.eviction_handle.take() {
            match tokio::time::timeout(Duration::from_secs(5), handle).await {
                Ok(Ok(())) => tracing::debug!("eviction task joined"),
                Ok(Err(e)) => tracing::warn!(error = %e, "eviction task panicked"),
                Err(_) => tracing::warn!("eviction task stop timed out"),
            }
        }
        self.health.eviction = ComponentHealth::Stopped;
    }
}
