//! Data models for dbdesk.
//!
//! This module contains all core data structures:
//! - `target` - TargetDescriptor, PoolStatus
//! - `meta_bool` - MetaBool quad-state flag
//! - `schema` - Columns, Indexes, PrimaryKeys, CheckConstraints, TablePrivileges, SchemaTable
//! - `foreign_keys` - ForeignKeys
//! - `definition` - Row write and DDL inputs
//! - `result` - ResultSet

pub mod definition;
pub mod foreign_keys;
pub mod meta_bool;
pub mod result;
pub mod schema;
pub mod target;

pub use definition::{
    ColumnDefinition, ColumnValue, DropBehavior, ForeignKeyDefinition, KeyValue, MatchType,
    NewColumn, NullClause, ReferentialAction,
};
pub use foreign_keys::{ForeignKey, ForeignKeys};
pub use meta_bool::MetaBool;
pub use result::{ResultSet, RowRef};
pub use schema::{
    CheckConstraints, Columns, DefaultValue, Indexes, PrimaryKeys, SchemaReference, SchemaRow,
    SchemaTable, TablePrivileges,
};
pub use target::{PoolStatus, TargetDescriptor, TargetDescriptorBuilder};
