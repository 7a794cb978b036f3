//! Database product configuration.
//!
//! Products are looked up by identifier; any property a product leaves unset
//! falls back to the `"*"` entry. A resolved product names the connector
//! variant, the registered driver and the connection URL template, in which
//! `%h`, `%p` and `%d` stand for host, port and database.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DeskError;
use crate::models::TargetDescriptor;

/// Product entry whose values apply to every product that leaves them unset.
pub const WILDCARD_PRODUCT: &str = "*";

/// Default number of simultaneous connections per target.
pub const DEFAULT_CONNECTIONS: usize = 4;

/// Default number of referenced rows offered as possible values.
pub const DEFAULT_FOREIGN_KEY_ROWS: u64 = 20;

/// Get the default data directory.
pub fn default_data_dir() -> PathBuf {
    #[cfg(debug_assertions)]
    {
        PathBuf::from("./dbdesk_data")
    }

    #[cfg(not(debug_assertions))]
    {
        dirs::data_dir().map(|d| d.join("dbdesk")).unwrap_or_else(|| PathBuf::from("./dbdesk_data"))
    }
}

/// Pool timing settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Idle connections older than this are closed by the sweep
    pub max_idle_secs: u64,
    /// Interval between sweeps
    pub sweep_interval_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self { max_idle_secs: 300, sweep_interval_secs: 180 }
    }
}

impl PoolSettings {
    /// Max idle time as a duration.
    pub fn max_idle(&self) -> Duration {
        Duration::from_secs(self.max_idle_secs)
    }

    /// Sweep interval as a duration, never zero.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// Per-product properties. Unset values fall back to the `"*"` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductConfig {
    /// Display name
    pub name: Option<String>,
    /// Connector variant: `generic`, `mysql` or `postgresql`
    pub connector: Option<String>,
    /// Registered driver name
    pub driver: Option<String>,
    /// Connection URL template with `%h`, `%p` and `%d` placeholders
    pub url: Option<String>,
    /// Default port
    pub port: Option<u16>,
    /// Maximum simultaneous connections per target
    pub connections: Option<usize>,
    /// Maximum referenced rows offered as possible values of a foreign key column
    pub foreign_key_rows: Option<u64>,
}

/// Configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Products by identifier
    pub products: HashMap<String, ProductConfig>,
    /// Pool timing
    pub pool: PoolSettings,
    /// Connections per target when neither the product nor `"*"` sets one
    pub default_connections: Option<usize>,
}

impl DatabaseConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration with PostgreSQL and MySQL presets.
    pub fn with_builtin_products() -> Self {
        Self::new()
            .with_product(
                WILDCARD_PRODUCT,
                ProductConfig {
                    connections: Some(DEFAULT_CONNECTIONS),
                    foreign_key_rows: Some(DEFAULT_FOREIGN_KEY_ROWS),
                    ..Default::default()
                },
            )
            .with_product(
                "postgresql",
                ProductConfig {
                    name: Some("PostgreSQL".to_string()),
                    connector: Some("postgresql".to_string()),
                    driver: Some("postgres".to_string()),
                    url: Some("postgresql://%h:%p/%d".to_string()),
                    port: Some(5432),
                    ..Default::default()
                },
            )
            .with_product(
                "mysql",
                ProductConfig {
                    name: Some("MySQL".to_string()),
                    connector: Some("mysql".to_string()),
                    driver: Some("mysql".to_string()),
                    url: Some("mysql://%h:%p/%d".to_string()),
                    port: Some(3306),
                    ..Default::default()
                },
            )
    }

    /// Add or replace a product.
    pub fn with_product(mut self, id: impl Into<String>, product: ProductConfig) -> Self {
        self.products.insert(id.into(), product);
        self
    }

    /// Set pool timing.
    pub fn with_pool(mut self, pool: PoolSettings) -> Self {
        self.pool = pool;
        self
    }

    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self, DeskError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON document from disk.
    pub fn from_file(path: &Path) -> Result<Self, DeskError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            DeskError::config(format!("Cannot read configuration {}: {e}", path.display()))
        })?;
        let config = Self::from_json(&json)?;
        tracing::debug!(
            path = %path.display(),
            products = config.products.len(),
            "Loaded database configuration"
        );
        Ok(config)
    }

    /// Default configuration file location.
    pub fn default_path() -> PathBuf {
        default_data_dir().join("databases.json")
    }

    /// Product identifiers, excluding the wildcard entry.
    pub fn product_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .products
            .keys()
            .map(String::as_str)
            .filter(|id| *id != WILDCARD_PRODUCT)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Resolve a product, applying wildcard fallbacks.
    ///
    /// Fails for an unknown product or when connector, driver or URL template
    /// are missing after fallback.
    pub fn product(&self, id: &str) -> Result<ResolvedProduct, DeskError> {
        let product = self
            .products
            .get(id)
            .filter(|_| id != WILDCARD_PRODUCT)
            .ok_or_else(|| DeskError::config(format!("Unknown database product: {id}")))?;
        let fallback = self.products.get(WILDCARD_PRODUCT);

        fn pick<T: Clone>(
            own: &Option<T>,
            fallback: Option<&ProductConfig>,
            get: impl Fn(&ProductConfig) -> &Option<T>,
        ) -> Option<T> {
            own.clone().or_else(|| fallback.and_then(|f| get(f).clone()))
        }

        let require = |value: Option<String>, property: &str| {
            value.filter(|v| !v.trim().is_empty()).ok_or_else(|| {
                DeskError::config(format!("Product {id} has no {property} configured"))
            })
        };

        Ok(ResolvedProduct {
            id: id.to_string(),
            name: pick(&product.name, fallback, |p| &p.name).unwrap_or_else(|| id.to_string()),
            connector: require(pick(&product.connector, fallback, |p| &p.connector), "connector")?,
            driver: require(pick(&product.driver, fallback, |p| &p.driver), "driver")?,
            url_template: require(pick(&product.url, fallback, |p| &p.url), "url")?,
            default_port: pick(&product.port, fallback, |p| &p.port),
            connections: pick(&product.connections, fallback, |p| &p.connections)
                .or(self.default_connections)
                .unwrap_or(DEFAULT_CONNECTIONS)
                .max(1),
            foreign_key_rows: pick(&product.foreign_key_rows, fallback, |p| &p.foreign_key_rows)
                .unwrap_or(DEFAULT_FOREIGN_KEY_ROWS),
        })
    }
}

/// A product with all fallbacks applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProduct {
    /// Product identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Connector variant name
    pub connector: String,
    /// Driver name
    pub driver: String,
    /// URL template
    pub url_template: String,
    /// Default port
    pub default_port: Option<u16>,
    /// Maximum simultaneous connections per target
    pub connections: usize,
    /// Maximum referenced rows offered as possible values
    pub foreign_key_rows: u64,
}

impl ResolvedProduct {
    /// Substitute host, port and database into the URL template.
    ///
    /// A host containing `%h` or a database containing `%d` is rejected so a
    /// substituted value can never be substituted again.
    pub fn connection_url(&self, target: &TargetDescriptor) -> Result<String, DeskError> {
        if target.host.contains("%h") {
            return Err(DeskError::config("Host may not contain %h"));
        }
        if target.database.contains("%d") {
            return Err(DeskError::config("Database may not contain %d"));
        }
        if !self.url_template.contains("%h") && !self.url_template.contains("%d") {
            return Err(DeskError::config(format!(
                "URL template for {} has no %h or %d placeholder",
                self.id
            )));
        }

        let mut url = String::with_capacity(self.url_template.len() + target.host.len());
        let mut chars = self.url_template.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '%' {
                url.push(c);
                continue;
            }
            match chars.peek() {
                Some('h') => url.push_str(&target.host),
                Some('p') => url.push_str(&target.port.to_string()),
                Some('d') => url.push_str(&target.database),
                _ => {
                    url.push('%');
                    continue;
                }
            }
            chars.next();
        }
        Ok(url)
    }
}
