//! Per-target connection pooling with idle eviction.
//!
//! Provides connection management with:
//! - One bounded pool per target descriptor, created on first use
//! - Reuse of the most recently released idle connection
//! - Guaranteed single release through the [`PooledConnection`] guard
//! - A single lazily started sweep task closing connections idle too long

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::{DatabaseConfig, ResolvedProduct};
use crate::error::DeskError;
use crate::models::{PoolStatus, ResultSet, TargetDescriptor};
use crate::services::driver::{Driver, DriverConnection};
use crate::services::mysql::MySqlDriver;
use crate::services::postgres::PostgresDriver;

/// Connection pools for every target in use.
///
/// Cloning is cheap; clones share the same pools and sweep task.
#[derive(Clone)]
pub struct DatabasePool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    config: Arc<DatabaseConfig>,
    drivers: RwLock<HashMap<String, Arc<dyn Driver>>>,
    targets: Mutex<HashMap<TargetDescriptor, Arc<TargetPool>>>,
    sweeper_started: AtomicBool,
    next_serial: AtomicU64,
    shutdown: CancellationToken,
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl DatabasePool {
    /// Create a pool with the built-in `postgres` and `mysql` drivers registered.
    pub fn new(config: Arc<DatabaseConfig>) -> Self {
        let pool = Self::without_drivers(config);
        pool.register_driver(Arc::new(PostgresDriver::new()));
        pool.register_driver(Arc::new(MySqlDriver::new()));
        pool
    }

    /// Create a pool with no drivers registered.
    pub fn without_drivers(config: Arc<DatabaseConfig>) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                config,
                drivers: RwLock::new(HashMap::new()),
                targets: Mutex::new(HashMap::new()),
                sweeper_started: AtomicBool::new(false),
                next_serial: AtomicU64::new(0),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Register a driver under its name, replacing any previous one.
    pub fn register_driver(&self, driver: Arc<dyn Driver>) {
        let name = driver.name().to_string();
        tracing::debug!(driver = %name, "Registering driver");
        self.inner.drivers.write().insert(name, driver);
    }

    /// Get the configuration.
    pub fn config(&self) -> &DatabaseConfig {
        &self.inner.config
    }

    /// Get a registered driver by name.
    pub fn driver(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.inner.drivers.read().get(name).cloned()
    }

    /// Resolve the product of a target.
    pub fn product(&self, target: &TargetDescriptor) -> Result<ResolvedProduct, DeskError> {
        self.inner.config.product(&target.product)
    }

    /// Acquire a connection for the target.
    ///
    /// Waits while all of the target's connections are checked out. Failure to
    /// open a new physical connection is returned as-is; nothing is retried.
    /// Fails once the pool has been shut down.
    pub async fn acquire(&self, target: &TargetDescriptor) -> Result<PooledConnection, DeskError> {
        target.validate().map_err(DeskError::config)?;
        if self.inner.shutdown.is_cancelled() {
            return Err(DeskError::connection("Connection pool is shut down"));
        }
        let pool = self.target_pool(target)?;
        self.ensure_sweeper();

        let permit = pool
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DeskError::connection("Connection pool is shut down"))?;

        loop {
            let candidate = pool.idle.lock().pop();
            let Some(idle) = candidate else { break };
            if idle.conn.is_closed() || idle.generation != pool.generation.load(Ordering::SeqCst) {
                tracing::debug!(
                    target_url = %pool.target.display_url(),
                    serial = idle.serial,
                    "Discarding stale idle connection"
                );
                pool.discard(idle.conn);
                continue;
            }
            tracing::trace!(
                target_url = %pool.target.display_url(),
                serial = idle.serial,
                "Reusing idle connection"
            );
            return Ok(PooledConnection {
                conn: Some(idle.conn),
                pool,
                serial: idle.serial,
                generation: idle.generation,
                broken: false,
                _permit: permit,
            });
        }

        let generation = pool.generation.load(Ordering::SeqCst);
        let conn = pool.driver.connect(&pool.url, &pool.target).await.map_err(|e| {
            tracing::warn!(
                target_url = %pool.target.display_url(),
                error = %e,
                "Failed to open connection"
            );
            e
        })?;
        let serial = self.inner.next_serial.fetch_add(1, Ordering::SeqCst) + 1;
        pool.open.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(
            target_url = %pool.target.display_url(),
            serial,
            driver = %pool.driver.name(),
            "Opened connection"
        );

        Ok(PooledConnection {
            conn: Some(conn),
            pool,
            serial,
            generation,
            broken: false,
            _permit: permit,
        })
    }

    fn target_pool(&self, target: &TargetDescriptor) -> Result<Arc<TargetPool>, DeskError> {
        if let Some(pool) = self.inner.targets.lock().get(target) {
            return Ok(pool.clone());
        }

        let product = self.product(target)?;
        let driver = self
            .driver(&product.driver)
            .ok_or_else(|| DeskError::config(format!("Unknown driver: {}", product.driver)))?;
        let url = product.connection_url(target)?;

        let mut targets = self.inner.targets.lock();
        // Checked under the lock so shutdown sees every pool created before it.
        if self.inner.shutdown.is_cancelled() {
            return Err(DeskError::connection("Connection pool is shut down"));
        }
        let pool = targets.entry(target.clone()).or_insert_with(|| {
            tracing::info!(
                target_url = %target.display_url(),
                max_size = product.connections,
                "Created connection pool"
            );
            Arc::new(TargetPool {
                target: target.clone(),
                driver,
                url,
                max_size: product.connections,
                permits: Arc::new(Semaphore::new(product.connections)),
                idle: Mutex::new(Vec::new()),
                open: AtomicUsize::new(0),
                generation: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            })
        });
        Ok(pool.clone())
    }

    fn ensure_sweeper(&self) {
        if self
            .inner
            .sweeper_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let weak: Weak<PoolInner> = Arc::downgrade(&self.inner);
        let token = self.inner.shutdown.clone();
        let period = self.inner.config.pool.sweep_interval();
        tracing::debug!(interval_secs = period.as_secs(), "Starting idle connection sweep");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        DatabasePool { inner }.sweep_idle().await;
                    }
                }
            }
            tracing::debug!("Idle connection sweep stopped");
        });
    }

    /// Close idle connections that have been idle for at least the configured max idle time.
    ///
    /// Returns the number of connections closed. Close failures are logged and
    /// do not stop the sweep.
    pub async fn sweep_idle(&self) -> usize {
        let max_idle = self.inner.config.pool.max_idle();
        let now = Instant::now();
        let pools: Vec<Arc<TargetPool>> = self.inner.targets.lock().values().cloned().collect();

        let mut closed = 0;
        for pool in pools {
            let expired: Vec<IdleConnection> = {
                let mut idle = pool.idle.lock();
                let (expired, keep): (Vec<_>, Vec<_>) = idle
                    .drain(..)
                    .partition(|c| now.saturating_duration_since(c.released_at) >= max_idle);
                *idle = keep;
                expired
            };

            for idle in expired {
                closed += 1;
                pool.close_now(idle.conn, idle.serial).await;
            }
        }

        if closed > 0 {
            tracing::info!(closed, "Closed idle connections");
        }
        self.remove_unused();
        closed
    }

    /// Close every connection to the target's database, under any credentials.
    ///
    /// Idle connections are closed immediately; checked-out ones are closed
    /// when they are released. Returns the number closed immediately.
    pub async fn close_database(&self, target: &TargetDescriptor) -> usize {
        let pools: Vec<Arc<TargetPool>> = self
            .inner
            .targets
            .lock()
            .values()
            .filter(|p| p.target.same_database(target))
            .cloned()
            .collect();

        let mut closed = 0;
        for pool in pools {
            pool.generation.fetch_add(1, Ordering::SeqCst);
            let drained: Vec<IdleConnection> = pool.idle.lock().drain(..).collect();
            for idle in drained {
                closed += 1;
                pool.close_now(idle.conn, idle.serial).await;
            }
        }

        tracing::debug!(
            database = %target.database,
            host = %target.host,
            closed,
            "Closed database connections"
        );
        self.remove_unused();
        closed
    }

    /// Forget target pools with no idle connections and no outstanding users.
    ///
    /// Every checkout and every in-flight acquire holds a clone of its pool, so
    /// a pool referenced only by the map has nothing in use.
    fn remove_unused(&self) {
        self.inner.targets.lock().retain(|target, pool| {
            let keep = Arc::strong_count(pool) > 1 || !pool.idle.lock().is_empty();
            if !keep {
                tracing::debug!(
                    target_url = %target.display_url(),
                    "Removed unused connection pool"
                );
            }
            keep
        });
    }

    /// Get the status of the target's pool, if it exists.
    pub fn status(&self, target: &TargetDescriptor) -> Option<PoolStatus> {
        let pool = self.inner.targets.lock().get(target).cloned()?;
        Some(pool.status())
    }

    /// Get the status of every pool.
    pub fn all_statuses(&self) -> Vec<(TargetDescriptor, PoolStatus)> {
        self.inner.targets.lock().values().map(|p| (p.target.clone(), p.status())).collect()
    }

    /// Stop the sweep task and close every idle connection.
    ///
    /// Waiting and later acquires fail; checked-out connections are closed on release.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let pools: Vec<Arc<TargetPool>> = self.inner.targets.lock().values().cloned().collect();
        for pool in pools {
            pool.closed.store(true, Ordering::SeqCst);
            pool.permits.close();
            let drained: Vec<IdleConnection> = pool.idle.lock().drain(..).collect();
            for idle in drained {
                pool.close_now(idle.conn, idle.serial).await;
            }
        }
        tracing::info!("Connection pools shut down");
    }

    /// Whether the sweep task has been started.
    pub fn is_sweeper_started(&self) -> bool {
        self.inner.sweeper_started.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for DatabasePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabasePool")
            .field("targets", &self.inner.targets.lock().len())
            .field("sweeper_started", &self.is_sweeper_started())
            .finish()
    }
}

// ========== Per-target pool ==========

struct IdleConnection {
    conn: Box<dyn DriverConnection>,
    serial: u64,
    generation: u64,
    released_at: Instant,
}

struct TargetPool {
    target: TargetDescriptor,
    driver: Arc<dyn Driver>,
    url: String,
    max_size: usize,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<IdleConnection>>,
    open: AtomicUsize,
    generation: AtomicU64,
    closed: AtomicBool,
}

impl TargetPool {
    fn release(&self, conn: Box<dyn DriverConnection>, serial: u64, generation: u64, broken: bool) {
        let stale = generation != self.generation.load(Ordering::SeqCst);
        if broken || stale || conn.is_closed() || self.closed.load(Ordering::SeqCst) {
            tracing::debug!(
                target_url = %self.target.display_url(),
                serial,
                broken,
                stale,
                "Closing released connection"
            );
            self.discard(conn);
            return;
        }

        self.idle.lock().push(IdleConnection {
            conn,
            serial,
            generation,
            released_at: Instant::now(),
        });
        tracing::trace!(target_url = %self.target.display_url(), serial, "Released connection");
    }

    /// Close without waiting, from contexts that cannot await.
    fn discard(&self, conn: Box<dyn DriverConnection>) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        if conn.is_closed() {
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let target = self.target.display_url();
            handle.spawn(async move {
                if let Err(e) = conn.close().await {
                    tracing::warn!(target_url = %target, error = %e, "Failed to close connection");
                }
            });
        }
    }

    async fn close_now(&self, conn: Box<dyn DriverConnection>, serial: u64) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        match conn.close().await {
            Ok(()) => tracing::debug!(
                target_url = %self.target.display_url(),
                serial,
                "Closed connection"
            ),
            Err(e) => tracing::warn!(
                target_url = %self.target.display_url(),
                serial,
                error = %e,
                "Failed to close connection"
            ),
        }
    }

    fn status(&self) -> PoolStatus {
        let size = self.open.load(Ordering::SeqCst);
        let idle = self.idle.lock().len();
        PoolStatus { max_size: self.max_size, size, idle, in_use: size.saturating_sub(idle) }
    }
}

// ========== Checked-out connection ==========

/// A connection checked out of the pool.
///
/// Dropping the guard releases the connection exactly once, stamping the
/// release time. A connection that failed with a connectivity error is closed
/// instead of returned.
pub struct PooledConnection {
    conn: Option<Box<dyn DriverConnection>>,
    pool: Arc<TargetPool>,
    serial: u64,
    generation: u64,
    broken: bool,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Sequence number of the physical connection, unique within the pool.
    ///
    /// Equal serials mean the same physical connection was reused.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Target this connection belongs to.
    pub fn target(&self) -> &TargetDescriptor {
        &self.pool.target
    }

    /// Connection URL (without credentials).
    pub fn url(&self) -> &str {
        &self.pool.url
    }

    /// Driver that opened this connection.
    pub fn driver(&self) -> &dyn Driver {
        self.pool.driver.as_ref()
    }

    /// Run a statement that returns rows.
    pub async fn query(
        &mut self,
        sql: &str,
        params: &[Option<String>],
    ) -> Result<ResultSet, DeskError> {
        tracing::trace!(serial = self.serial, sql, params = params.len(), "Query");
        let result = self.connection()?.query(sql, params).await;
        self.track(result)
    }

    /// Run a statement and return the number of affected rows.
    pub async fn execute(
        &mut self,
        sql: &str,
        params: &[Option<String>],
    ) -> Result<u64, DeskError> {
        tracing::trace!(serial = self.serial, sql, params = params.len(), "Execute");
        let result = self.connection()?.execute(sql, params).await;
        self.track(result)
    }

    /// Server product and version.
    pub async fn server_version(&mut self) -> Result<String, DeskError> {
        let result = self.connection()?.server_version().await;
        self.track(result)
    }

    /// Close this connection on release instead of returning it.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// Release the connection back to the pool.
    pub fn release(self) {}

    fn connection(&mut self) -> Result<&mut (dyn DriverConnection + 'static), DeskError> {
        self.conn.as_deref_mut().ok_or_else(|| DeskError::internal("Connection already released"))
    }

    fn track<T>(&mut self, result: Result<T, DeskError>) -> Result<T, DeskError> {
        if let Err(e) = &result {
            if e.is_connection_lost() {
                tracing::warn!(serial = self.serial, error = %e, "Connection lost");
                self.broken = true;
            }
        }
        result
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn, self.serial, self.generation, self.broken);
        }
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("target", &self.pool.target)
            .field("serial", &self.serial)
            .field("broken", &self.broken)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PoolSettings, ProductConfig};
    use crate::testing::MemoryDriver;
    use std::time::Duration;

    fn config(connections: usize) -> Arc<DatabaseConfig> {
        Arc::new(
            DatabaseConfig::new()
                .with_product(
                    "generic",
                    ProductConfig {
                        connector: Some("generic".to_string()),
                        driver: Some("memory".to_string()),
                        url: Some("memory://%h:%p/%d".to_string()),
                        connections: Some(connections),
                        ..Default::default()
                    },
                )
                .with_pool(PoolSettings { max_idle_secs: 300, sweep_interval_secs: 180 }),
        )
    }

    fn pool_with(connections: usize) -> (DatabasePool, Arc<MemoryDriver>) {
        let pool = DatabasePool::without_drivers(config(connections));
        let driver = Arc::new(MemoryDriver::new());
        pool.register_driver(driver.clone());
        (pool, driver)
    }

    fn target() -> TargetDescriptor {
        TargetDescriptor::new("generic", "db1", 5000, "sales", "admin").with_password("pw")
    }

    #[tokio::test]
    async fn test_release_then_acquire_reuses_connection() {
        let (pool, driver) = pool_with(4);

        let first = pool.acquire(&target()).await.unwrap();
        let serial = first.serial();
        first.release();

        let second = pool.acquire(&target()).await.unwrap();
        assert_eq!(second.serial(), serial);
        assert_eq!(driver.opened(), 1);
        assert_eq!(driver.last_url().as_deref(), Some("memory://db1:5000/sales"));
    }

    #[tokio::test]
    async fn test_concurrent_checkouts_get_distinct_connections() {
        let (pool, driver) = pool_with(4);

        let a = pool.acquire(&target()).await.unwrap();
        let b = pool.acquire(&target()).await.unwrap();
        assert_ne!(a.serial(), b.serial());
        assert_eq!(driver.opened(), 2);

        let status = pool.status(&target()).unwrap();
        assert_eq!(status, PoolStatus { max_size: 4, size: 2, idle: 0, in_use: 2 });
        drop(a);
        drop(b);
        assert_eq!(pool.status(&target()).unwrap().idle, 2);
    }

    #[tokio::test]
    async fn test_exhausted_pool_waits_for_release() {
        let (pool, _driver) = pool_with(1);
        let held = pool.acquire(&target()).await.unwrap();
        let serial = held.serial();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire(&target()).await.map(|c| c.serial()) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        let reused = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(reused, serial);
    }

    #[tokio::test]
    async fn test_connect_failure_propagates_without_retry() {
        let (pool, driver) = pool_with(2);
        driver.fail_connect(true);

        let err = pool.acquire(&target()).await.unwrap_err();
        assert!(matches!(err, DeskError::Connection { .. }));
        assert_eq!(driver.connect_attempts(), 1);

        // The slot was given back
        driver.fail_connect(false);
        let a = pool.acquire(&target()).await.unwrap();
        let b = pool.acquire(&target()).await.unwrap();
        assert_ne!(a.serial(), b.serial());
    }

    #[tokio::test]
    async fn test_invalid_target_is_config_error() {
        let (pool, driver) = pool_with(2);
        let mut bad = target();
        bad.database = String::new();
        assert!(matches!(pool.acquire(&bad).await, Err(DeskError::Config { .. })));

        let mut unknown = target();
        unknown.product = "oracle".to_string();
        assert!(matches!(pool.acquire(&unknown).await, Err(DeskError::Config { .. })));
        assert_eq!(driver.connect_attempts(), 0);
    }

    #[tokio::test]
    async fn test_unknown_driver_is_config_error() {
        let pool = DatabasePool::without_drivers(config(1));
        let err = pool.acquire(&target()).await.unwrap_err();
        assert!(err.to_string().contains("Unknown driver"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_closes_only_expired_connections() {
        let (pool, driver) = pool_with(4);

        let old = pool.acquire(&target()).await.unwrap();
        let old_serial = old.serial();
        drop(old);

        tokio::time::advance(Duration::from_secs(200)).await;
        let young = pool.acquire(&target()).await.unwrap();
        assert_eq!(young.serial(), old_serial);
        let other = pool.acquire(&target()).await.unwrap();
        let other_serial = other.serial();
        drop(other);
        drop(young);

        // Both released at t=200; nothing has been idle for 300s yet
        assert_eq!(pool.sweep_idle().await, 0);

        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(pool.sweep_idle().await, 2);
        assert_eq!(driver.closed(), 2);

        let fresh = pool.acquire(&target()).await.unwrap();
        assert_ne!(fresh.serial(), old_serial);
        assert_ne!(fresh.serial(), other_serial);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_error_does_not_stop_sweep() {
        let (pool, driver) = pool_with(4);
        let a = pool.acquire(&target()).await.unwrap();
        let b = pool.acquire(&target()).await.unwrap();
        drop(a);
        drop(b);

        driver.fail_close(true);
        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(pool.sweep_idle().await, 2);
        assert_eq!(driver.close_attempts(), 2);
        assert!(pool.status(&target()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweep_evicts_idle_connection() {
        let (pool, driver) = pool_with(2);
        assert!(!pool.is_sweeper_started());

        let conn = pool.acquire(&target()).await.unwrap();
        let serial = conn.serial();
        drop(conn);
        assert!(pool.is_sweeper_started());

        // Ticks at 180s (too young) and 360s (evicts)
        tokio::time::sleep(Duration::from_secs(361)).await;
        tokio::task::yield_now().await;
        assert_eq!(driver.closed(), 1);

        let conn = pool.acquire(&target()).await.unwrap();
        assert_ne!(conn.serial(), serial);
    }

    #[tokio::test]
    async fn test_broken_connection_is_not_reused() {
        let (pool, driver) = pool_with(2);
        let mut conn = pool.acquire(&target()).await.unwrap();
        let serial = conn.serial();
        driver.fail_queries_with_connection_error(true);
        assert!(conn.query("SELECT 1", &[]).await.is_err());
        drop(conn);
        driver.fail_queries_with_connection_error(false);

        let conn = pool.acquire(&target()).await.unwrap();
        assert_ne!(conn.serial(), serial);
        assert_eq!(pool.status(&target()).unwrap().size, 1);
    }

    #[tokio::test]
    async fn test_statement_error_keeps_connection() {
        let (pool, driver) = pool_with(2);
        driver.fail_on("BROKEN SQL");
        let mut conn = pool.acquire(&target()).await.unwrap();
        let serial = conn.serial();
        let err = conn.execute("BROKEN SQL", &[]).await.unwrap_err();
        assert!(matches!(err, DeskError::Statement { .. }));
        drop(conn);

        let conn = pool.acquire(&target()).await.unwrap();
        assert_eq!(conn.serial(), serial);
    }

    #[tokio::test]
    async fn test_close_database_closes_all_credentials() {
        let (pool, driver) = pool_with(2);
        let reader = TargetDescriptor::new("generic", "db1", 5000, "sales", "reader");
        let other_db = target().with_database("hr");

        let busy = pool.acquire(&target()).await.unwrap();
        drop(pool.acquire(&target()).await.unwrap());
        drop(pool.acquire(&reader).await.unwrap());
        drop(pool.acquire(&other_db).await.unwrap());

        assert_eq!(pool.close_database(&target()).await, 2);
        assert_eq!(driver.closed(), 2);
        assert!(pool.status(&reader).is_none());

        // Checked-out connection is closed when it comes back
        drop(busy);
        tokio::task::yield_now().await;
        assert_eq!(pool.status(&target()).unwrap().size, 0);
        assert_eq!(pool.status(&other_db).unwrap().idle, 1);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_acquires() {
        let (pool, driver) = pool_with(2);
        drop(pool.acquire(&target()).await.unwrap());
        pool.shutdown().await;
        assert_eq!(driver.closed(), 1);
        assert!(matches!(pool.acquire(&target()).await, Err(DeskError::Connection { .. })));
    }

    #[tokio::test]
    async fn test_shutdown_rejects_targets_first_seen_afterwards() {
        let (pool, driver) = pool_with(2);
        drop(pool.acquire(&target()).await.unwrap());
        pool.shutdown().await;

        let hr = target().with_database("hr");
        assert!(matches!(pool.acquire(&hr).await, Err(DeskError::Connection { .. })));
        assert_eq!(driver.opened(), 1);
        assert!(pool.status(&hr).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_emptied_pools_are_removed() {
        let (pool, _driver) = pool_with(2);
        let held = pool.acquire(&target()).await.unwrap();
        let other_db = target().with_database("hr");
        drop(pool.acquire(&other_db).await.unwrap());

        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(pool.sweep_idle().await, 1);
        assert!(pool.status(&other_db).is_none());
        assert_eq!(pool.status(&target()).unwrap().in_use, 1);
        assert_eq!(pool.all_statuses().len(), 1);

        drop(held);
        let again = pool.acquire(&other_db).await.unwrap();
        assert_eq!(pool.status(&other_db).unwrap().in_use, 1);
        drop(again);
    }
}
