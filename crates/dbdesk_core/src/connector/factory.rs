//! Connector selection by product.

use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::connector::{
    Connector, ConnectorContext, ConnectorKind, GenericConnector, MySqlConnector, PostgresConnector,
};
use crate::error::DeskError;
use crate::models::TargetDescriptor;
use crate::services::DatabasePool;

/// Builds the connector configured for a target's product.
#[derive(Clone)]
pub struct ConnectorFactory {
    config: Arc<DatabaseConfig>,
    pool: DatabasePool,
}

impl ConnectorFactory {
    pub fn new(config: Arc<DatabaseConfig>, pool: DatabasePool) -> Self {
        Self { config, pool }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Resolve the connector for `target`.
    ///
    /// Unknown products and unknown connector names are configuration
    /// errors; there is no fallback to the generic connector.
    pub fn connector(&self, target: &TargetDescriptor) -> Result<Box<dyn Connector>, DeskError> {
        target.validate().map_err(DeskError::config)?;
        let product = self.config.product(&target.product)?;
        let kind = ConnectorKind::parse(&product.connector)?;
        tracing::debug!(product = %product.id, connector = %kind, "Resolved connector");

        let context = ConnectorContext::new(target.clone(), product, self.pool.clone());
        Ok(match kind {
            ConnectorKind::Generic => Box::new(GenericConnector::new(context)),
            ConnectorKind::MySql => Box::new(MySqlConnector::new(context)),
            ConnectorKind::PostgreSql => Box::new(PostgresConnector::new(context)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProductConfig;

    fn factory() -> ConnectorFactory {
        let config = Arc::new(
            DatabaseConfig::new()
                .with_product(
                    "pg",
                    ProductConfig {
                        connector: Some("PostgreSQL".to_string()),
                        driver: Some("postgres".to_string()),
                        url: Some("host=%h port=%p dbname=%d".to_string()),
                        ..Default::default()
                    },
                )
                .with_product(
                    "odd",
                    ProductConfig {
                        connector: Some("oracle".to_string()),
                        driver: Some("postgres".to_string()),
                        url: Some("%h/%d".to_string()),
                        ..Default::default()
                    },
                ),
        );
        let pool = DatabasePool::new(config.clone());
        ConnectorFactory::new(config, pool)
    }

    #[test]
    fn test_connector_kind_parse() {
        assert_eq!(ConnectorKind::parse("jdbc").unwrap(), ConnectorKind::Generic);
        assert_eq!(ConnectorKind::parse("MySQL").unwrap(), ConnectorKind::MySql);
        assert_eq!(ConnectorKind::parse("pgsql").unwrap(), ConnectorKind::PostgreSql);
        assert!(matches!(ConnectorKind::parse("db2"), Err(DeskError::Config { .. })));
    }

    #[test]
    fn test_resolves_configured_connector() {
        let target = TargetDescriptor::new("pg", "localhost", 5432, "app", "admin");
        let connector = factory().connector(&target).unwrap();
        assert_eq!(connector.kind(), ConnectorKind::PostgreSql);
        assert_eq!(connector.context().target(), &target);
        assert_eq!(connector.get_url().unwrap(), "host=localhost port=5432 dbname=app");
        assert_eq!(connector.get_driver_name().unwrap(), "tokio-postgres 0.7");
    }

    #[test]
    fn test_unknown_product_fails_fast() {
        let target = TargetDescriptor::new("sybase", "localhost", 5000, "app", "admin");
        assert!(matches!(factory().connector(&target), Err(DeskError::Config { .. })));

        let target = TargetDescriptor::new("odd", "localhost", 1521, "app", "admin");
        assert!(matches!(factory().connector(&target), Err(DeskError::Config { .. })));
    }

    #[test]
    fn test_invalid_target_is_rejected() {
        let target = TargetDescriptor::new("pg", "", 5432, "app", "admin");
        assert!(matches!(factory().connector(&target), Err(DeskError::Config { .. })));
    }
}
