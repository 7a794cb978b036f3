//! Scripted in-memory driver for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::{DatabaseConfig, ProductConfig};
use crate::connector::{Connector, ConnectorFactory};
use crate::error::DeskError;
use crate::models::{ResultSet, TargetDescriptor};
use crate::services::driver::{Driver, DriverConnection};
use crate::services::DatabasePool;

/// Products `generic`, `mysql` and `postgresql`, all served by the memory driver.
pub fn memory_config() -> DatabaseConfig {
    ["generic", "mysql", "postgresql"].into_iter().fold(DatabaseConfig::new(), |config, id| {
        config.with_product(
            id,
            ProductConfig {
                connector: Some(id.to_string()),
                driver: Some("memory".to_string()),
                url: Some("memory://%h:%p/%d".to_string()),
                foreign_key_rows: Some(50),
                ..Default::default()
            },
        )
    })
}

/// `admin@db1:5000/sales` for `product`.
pub fn memory_target(product: &str) -> TargetDescriptor {
    TargetDescriptor::new(product, "db1", 5000, "sales", "admin").with_password("pw")
}

/// Connector for [`memory_target`] with a fresh pool and driver.
pub fn connector_for(product: &str) -> (Box<dyn Connector>, MemoryDriver) {
    let config = Arc::new(memory_config());
    let pool = DatabasePool::without_drivers(config.clone());
    let driver = MemoryDriver::new();
    pool.register_driver(Arc::new(driver.clone()));
    let connector = ConnectorFactory::new(config, pool)
        .connector(&memory_target(product))
        .expect("memory products resolve");
    (connector, driver)
}

/// A statement seen by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub sql: String,
    pub params: Vec<Option<String>>,
}

#[derive(Default)]
struct MemoryState {
    responses: Mutex<Vec<(String, ResultSet)>>,
    failures: Mutex<Vec<String>>,
    log: Mutex<Vec<Recorded>>,
    last_url: Mutex<Option<String>>,
    connect_attempts: AtomicUsize,
    opened: AtomicUsize,
    close_attempts: AtomicUsize,
    closed: AtomicUsize,
    fail_connect: AtomicBool,
    fail_close: AtomicBool,
    connection_errors: AtomicBool,
}

/// Driver named `memory` that answers from scripted result sets.
#[derive(Clone, Default)]
pub struct MemoryDriver {
    state: Arc<MemoryState>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer statements containing `fragment` with `rows` (latest registration wins).
    pub fn respond(&self, fragment: &str, columns: &[&str], rows: Vec<Vec<Option<&str>>>) {
        let set = ResultSet::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.into_iter()
                .map(|r| r.into_iter().map(|v| v.map(String::from)).collect())
                .collect(),
        );
        self.state.responses.lock().push((fragment.to_string(), set));
    }

    /// Fail statements containing `fragment` with a statement error.
    pub fn fail_on(&self, fragment: &str) {
        self.state.failures.lock().push(fragment.to_string());
    }

    pub fn fail_connect(&self, fail: bool) {
        self.state.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn fail_close(&self, fail: bool) {
        self.state.fail_close.store(fail, Ordering::SeqCst);
    }

    pub fn fail_queries_with_connection_error(&self, fail: bool) {
        self.state.connection_errors.store(fail, Ordering::SeqCst);
    }

    pub fn log(&self) -> Vec<Recorded> {
        self.state.log.lock().clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.state.log.lock().iter().map(|r| r.sql.clone()).collect()
    }

    pub fn last(&self) -> Option<Recorded> {
        self.state.log.lock().last().cloned()
    }

    pub fn clear_log(&self) {
        self.state.log.lock().clear();
    }

    pub fn last_url(&self) -> Option<String> {
        self.state.last_url.lock().clone()
    }

    pub fn connect_attempts(&self) -> usize {
        self.state.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn close_attempts(&self) -> usize {
        self.state.close_attempts.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    fn name(&self) -> &str {
        "memory"
    }

    fn description(&self) -> String {
        "in-memory test driver".to_string()
    }

    async fn connect(
        &self,
        url: &str,
        _target: &TargetDescriptor,
    ) -> Result<Box<dyn DriverConnection>, DeskError> {
        self.state.connect_attempts.fetch_add(1, Ordering::SeqCst);
        *self.state.last_url.lock() = Some(url.to_string());
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(DeskError::connection(format!("could not connect to {url}")));
        }
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection { state: self.state.clone() }))
    }
}

struct MemoryConnection {
    state: Arc<MemoryState>,
}

impl MemoryConnection {
    fn record(&self, sql: &str, params: &[Option<String>]) -> Result<(), DeskError> {
        self.state.log.lock().push(Recorded { sql: sql.to_string(), params: params.to_vec() });
        if self.state.connection_errors.load(Ordering::SeqCst) {
            return Err(DeskError::connection("connection reset by peer"));
        }
        if self.state.failures.lock().iter().any(|f| sql.contains(f.as_str())) {
            return Err(DeskError::statement(
                format!("statement failed: {sql}"),
                None,
                None,
                None,
                Some("42000".to_string()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DriverConnection for MemoryConnection {
    async fn query(
        &mut self,
        sql: &str,
        params: &[Option<String>],
    ) -> Result<ResultSet, DeskError> {
        self.record(sql, params)?;
        Ok(self
            .state
            .responses
            .lock()
            .iter()
            .rev()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map(|(_, set)| set.clone())
            .unwrap_or_default())
    }

    async fn execute(&mut self, sql: &str, params: &[Option<String>]) -> Result<u64, DeskError> {
        self.record(sql, params)?;
        Ok(1)
    }

    async fn server_version(&mut self) -> Result<String, DeskError> {
        Ok("MemoryDB 1.0".to_string())
    }

    fn is_closed(&self) -> bool {
        false
    }

    async fn close(self: Box<Self>) -> Result<(), DeskError> {
        self.state.close_attempts.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_close.load(Ordering::SeqCst) {
            return Err(DeskError::connection("close failed"));
        }
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
