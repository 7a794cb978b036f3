//! Generic connector: standard catalogs and SQL for any backend.

use crate::connector::dialect::{Dialect, GenericDialect};
use crate::connector::{Connector, ConnectorContext, ConnectorKind};

/// Connector using only `information_schema` and standard SQL.
#[derive(Debug, Clone)]
pub struct GenericConnector {
    context: ConnectorContext,
}

impl GenericConnector {
    pub fn new(context: ConnectorContext) -> Self {
        Self { context }
    }
}

impl Connector for GenericConnector {
    fn context(&self) -> &ConnectorContext {
        &self.context
    }

    fn kind(&self) -> ConnectorKind {
        ConnectorKind::Generic
    }

    fn dialect(&self) -> &dyn Dialect {
        &GenericDialect
    }
}
