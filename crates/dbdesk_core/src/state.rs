//! Process-wide runtime state.
//!
//! Owns the configuration, the shared connection pool, the connector factory
//! and the tokio runtime that drives them. Request handlers running on their
//! own threads call [`DeskState::block_on`] to get a blocking call model over
//! the async connectors.

use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::connector::{Connector, ConnectorFactory};
use crate::error::DeskError;
use crate::models::{PoolStatus, TargetDescriptor};
use crate::services::DatabasePool;

/// Central runtime state shared by every request.
pub struct DeskState {
    config: Arc<DatabaseConfig>,
    pool: DatabasePool,
    factory: ConnectorFactory,
    /// Tokio runtime for async database operations
    tokio_runtime: tokio::runtime::Runtime,
}

impl DeskState {
    /// Create state from the configuration file in the default data
    /// directory, or from the built-in products when no file exists.
    pub fn new() -> Result<Self, DeskError> {
        let path = DatabaseConfig::default_path();
        let config = if path.exists() {
            DatabaseConfig::from_file(&path)?
        } else {
            tracing::debug!(
                path = %path.display(),
                "No configuration file, using built-in products"
            );
            DatabaseConfig::with_builtin_products()
        };
        Self::with_config(config)
    }

    /// Create state from an explicit configuration.
    pub fn with_config(config: DatabaseConfig) -> Result<Self, DeskError> {
        let config = Arc::new(config);
        let pool = DatabasePool::new(config.clone());
        Self::assemble(config, pool)
    }

    /// Create state around an existing pool, sharing its configuration.
    pub fn with_pool(pool: DatabasePool) -> Result<Self, DeskError> {
        let config = Arc::new(pool.config().clone());
        Self::assemble(config, pool)
    }

    fn assemble(config: Arc<DatabaseConfig>, pool: DatabasePool) -> Result<Self, DeskError> {
        let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(|e| DeskError::internal(format!("Failed to create tokio runtime: {e}")))?;

        let factory = ConnectorFactory::new(config.clone(), pool.clone());
        tracing::info!(products = ?config.product_ids(), "DeskState initialized");
        Ok(Self {
            config,
            pool,
            factory,
            tokio_runtime,
        })
    }

    // ========== Accessors ==========

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    pub fn factory(&self) -> &ConnectorFactory {
        &self.factory
    }

    /// Get a handle to the tokio runtime.
    pub fn runtime(&self) -> &tokio::runtime::Runtime {
        &self.tokio_runtime
    }

    // ========== Execution ==========

    /// Spawn a future on the tokio runtime.
    pub fn spawn<F, T>(&self, future: F) -> tokio::task::JoinHandle<T>
    where
        F: std::future::Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.tokio_runtime.spawn(future)
    }

    /// Block the calling thread until `future` completes.
    ///
    /// Must not be called from inside the runtime's own worker threads.
    pub fn block_on<F, T>(&self, future: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        self.tokio_runtime.block_on(future)
    }

    // ========== Connectors ==========

    /// Build the connector configured for `target`'s product.
    pub fn connector(&self, target: &TargetDescriptor) -> Result<Box<dyn Connector>, DeskError> {
        self.factory.connector(target)
    }

    /// Pool usage for `target`, or `None` before its first acquisition.
    pub fn pool_status(&self, target: &TargetDescriptor) -> Option<PoolStatus> {
        self.pool.status(target)
    }

    /// Close every pooled connection and stop the idle sweep.
    pub fn shutdown(&self) {
        self.block_on(self.pool.shutdown());
        tracing::info!("DeskState shut down");
    }
}

impl std::fmt::Debug for DeskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeskState")
            .field("products", &self.config.product_ids())
            .field("pool", &self.pool)
            .finish()
    }
}
