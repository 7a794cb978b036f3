//! Core types and services for the dbdesk database console.
//!
//! This crate provides the backend layer behind every schema and row request:
//!
//! - **error**: Error handling with statement-level details
//! - **config**: Product configuration and pool timing
//! - **models**: Targets, schema metadata records and statement inputs
//! - **services**: Drivers and the shared connection pool
//! - **connector**: Generic, MySQL and PostgreSQL connectors and the statement builder
//! - **state**: Runtime state owning the pool and the tokio runtime
//! - **logging**: Structured logging setup

pub mod config;
pub mod connector;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod state;

#[cfg(test)]
mod testing;

pub use config::{DatabaseConfig, PoolSettings, ProductConfig, ResolvedProduct};
pub use connector::{Connector, ConnectorFactory, ConnectorKind};
pub use error::{DeskError, ErrorInfo};
pub use logging::{init_logging, LogConfig, LogOutput, LoggingGuard};
pub use models::{
    CheckConstraints, ColumnDefinition, ColumnValue, Columns, DefaultValue, DropBehavior,
    ForeignKey, ForeignKeyDefinition, ForeignKeys, Indexes, KeyValue, MetaBool, NewColumn,
    PoolStatus, PrimaryKeys, ResultSet, SchemaTable, TablePrivileges, TargetDescriptor,
};
pub use services::{DatabasePool, Driver, DriverConnection, PooledConnection};
pub use state::DeskState;
