//! Connection target descriptor and pool status models.

use serde::{Deserialize, Serialize};

/// Identifies which physical database to connect to and with what credentials.
///
/// Two descriptors that compare equal share one connection pool.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetDescriptor {
    /// Product identifier resolved through the configuration (e.g. "postgresql")
    pub product: String,
    /// Server hostname or IP
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database name
    pub database: String,
    /// Login username
    pub username: String,
    /// Login password (empty when none)
    #[serde(default)]
    pub password: String,
}

impl TargetDescriptor {
    /// Create a new target with an empty password.
    pub fn new(
        product: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            product: product.into(),
            host: host.into(),
            port,
            database: database.into(),
            username: username.into(),
            password: String::new(),
        }
    }

    /// Create a builder for a target.
    pub fn builder() -> TargetDescriptorBuilder {
        TargetDescriptorBuilder::default()
    }

    /// Set the password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Same server and credentials, different database.
    pub fn with_database(&self, database: impl Into<String>) -> Self {
        Self { database: database.into(), ..self.clone() }
    }

    /// Validate the descriptor.
    pub fn validate(&self) -> Result<(), String> {
        if self.product.trim().is_empty() {
            return Err("Product is required".to_string());
        }
        if self.host.trim().is_empty() {
            return Err("Host is required".to_string());
        }
        if self.port == 0 {
            return Err("Port must be between 1 and 65535".to_string());
        }
        if self.database.trim().is_empty() {
            return Err("Database is required".to_string());
        }
        if self.username.trim().is_empty() {
            return Err("Username is required".to_string());
        }
        Ok(())
    }

    /// Whether both descriptors address the same database on the same server,
    /// regardless of credentials.
    pub fn same_database(&self, other: &TargetDescriptor) -> bool {
        self.product == other.product
            && self.host == other.host
            && self.port == other.port
            && self.database == other.database
    }

    /// Get the display string (without password).
    pub fn display_url(&self) -> String {
        format!(
            "{}://{}@{}:{}/{}",
            self.product, self.username, self.host, self.port, self.database
        )
    }
}

impl std::fmt::Debug for TargetDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetDescriptor")
            .field("product", &self.product)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Builder for TargetDescriptor.
#[derive(Debug, Default)]
pub struct TargetDescriptorBuilder {
    product: Option<String>,
    host: Option<String>,
    port: u16,
    database: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

impl TargetDescriptorBuilder {
    /// Set the product identifier.
    pub fn product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    /// Set the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the database name.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the username.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Build the descriptor.
    pub fn build(self) -> Result<TargetDescriptor, String> {
        let target = TargetDescriptor {
            product: self.product.ok_or("Product is required")?,
            host: self.host.ok_or("Host is required")?,
            port: self.port,
            database: self.database.ok_or("Database is required")?,
            username: self.username.ok_or("Username is required")?,
            password: self.password.unwrap_or_default(),
        };
        target.validate()?;
        Ok(target)
    }
}

/// Connection pool status for a single target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Maximum number of simultaneously open connections
    pub max_size: usize,
    /// Physical connections currently open (idle + in use)
    pub size: usize,
    /// Idle connections ready for reuse
    pub idle: usize,
    /// Connections currently checked out
    pub in_use: usize,
}

impl PoolStatus {
    /// Check whether a caller would have to wait for a connection.
    pub fn is_exhausted(&self) -> bool {
        self.in_use >= self.max_size
    }

    /// Get pool utilization as a percentage.
    pub fn utilization(&self) -> f64 {
        if self.max_size == 0 {
            0.0
        } else {
            (self.in_use as f64 / self.max_size as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TargetDescriptor {
        TargetDescriptor::new("postgresql", "db1", 5432, "sales", "admin").with_password("s3cret")
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        assert!(sample().validate().is_ok());

        let mut target = sample();
        target.host = "  ".to_string();
        assert_eq!(target.validate().unwrap_err(), "Host is required");

        let mut target = sample();
        target.port = 0;
        assert!(target.validate().is_err());

        let mut target = sample();
        target.username.clear();
        assert!(target.validate().is_err());
    }

    #[test]
    fn test_password_defaults_to_empty() {
        let target = TargetDescriptor::builder()
            .product("mysql")
            .host("localhost")
            .port(3306)
            .database("shop")
            .username("root")
            .build()
            .unwrap();
        assert_eq!(target.password, "");
    }

    #[test]
    fn test_builder_requires_database() {
        let err = TargetDescriptor::builder()
            .product("mysql")
            .host("localhost")
            .port(3306)
            .username("root")
            .build()
            .unwrap_err();
        assert_eq!(err, "Database is required");
    }

    #[test]
    fn test_debug_redacts_password() {
        let debug = format!("{:?}", sample());
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("<redacted>"));
        assert!(!sample().display_url().contains("s3cret"));
    }

    #[test]
    fn test_same_database_ignores_credentials() {
        let other = TargetDescriptor::new("postgresql", "db1", 5432, "sales", "reader");
        assert!(sample().same_database(&other));
        assert_ne!(sample(), other);
        assert!(!sample().same_database(&sample().with_database("template1")));
    }

    #[test]
    fn test_pool_status_utilization() {
        let status = PoolStatus { max_size: 4, size: 3, idle: 1, in_use: 2 };
        assert_eq!(status.utilization(), 50.0);
        assert!(!status.is_exhausted());
        let full = PoolStatus { max_size: 2, size: 2, idle: 0, in_use: 2 };
        assert!(full.is_exhausted());
    }
}
