//! Connectors: one contract over every supported backend.
//!
//! A [`Connector`] answers schema questions with the records of
//! [`crate::models`] and performs row writes and DDL for one target. The
//! generic connector speaks `information_schema` and standard SQL; the MySQL
//! and PostgreSQL connectors override the parts where their dialect or
//! catalogs differ.
//!
//! Every operation borrows a pooled connection for as long as it runs and
//! releases it on every path, including errors.

pub mod dialect;
pub mod factory;
pub mod generic;
pub mod mysql;
pub mod postgres;
pub mod standard;
pub mod statement;

use std::fmt;
use std::io::Write;

use async_trait::async_trait;

use crate::config::ResolvedProduct;
use crate::error::DeskError;
use crate::models::{
    CheckConstraints, ColumnDefinition, ColumnValue, Columns, DropBehavior, ForeignKeyDefinition,
    ForeignKeys, Indexes, KeyValue, NewColumn, PrimaryKeys, ResultSet, SchemaTable, TablePrivileges,
    TargetDescriptor,
};
use crate::services::{DatabasePool, PooledConnection};

pub use dialect::{Dialect, GenericDialect, MySqlDialect, PostgresDialect};
pub use factory::ConnectorFactory;
pub use generic::GenericConnector;
pub use mysql::MySqlConnector;
pub use postgres::PostgresConnector;
pub use statement::{Placeholders, Statement};

/// Backend variant selected by the `connector` product property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectorKind {
    Generic,
    MySql,
    PostgreSql,
}

impl ConnectorKind {
    /// Parse a `connector` property value.
    pub fn parse(value: &str) -> Result<Self, DeskError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "generic" | "jdbc" => Ok(Self::Generic),
            "mysql" => Ok(Self::MySql),
            "postgresql" | "postgres" | "pgsql" => Ok(Self::PostgreSql),
            other => Err(DeskError::config(format!("Unknown connector '{other}'"))),
        }
    }

    /// Canonical property value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::MySql => "mysql",
            Self::PostgreSql => "postgresql",
        }
    }
}

impl fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target, product and pool shared by a connector's operations.
#[derive(Clone)]
pub struct ConnectorContext {
    target: TargetDescriptor,
    product: ResolvedProduct,
    pool: DatabasePool,
}

impl ConnectorContext {
    pub fn new(target: TargetDescriptor, product: ResolvedProduct, pool: DatabasePool) -> Self {
        Self { target, product, pool }
    }

    pub fn target(&self) -> &TargetDescriptor {
        &self.target
    }

    pub fn product(&self) -> &ResolvedProduct {
        &self.product
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Borrow a connection for the target.
    pub async fn acquire(&self) -> Result<PooledConnection, DeskError> {
        self.pool.acquire(&self.target).await
    }

    /// Run a query on a freshly borrowed connection.
    pub async fn query(
        &self,
        sql: &str,
        params: &[Option<String>],
    ) -> Result<ResultSet, DeskError> {
        tracing::debug!(database = %self.target.database, sql, "Running query");
        let mut conn = self.acquire().await?;
        conn.query(sql, params).await
    }

    /// Run an update on a freshly borrowed connection.
    pub async fn execute(&self, sql: &str, params: &[Option<String>]) -> Result<u64, DeskError> {
        tracing::debug!(database = %self.target.database, sql, "Running update");
        let mut conn = self.acquire().await?;
        conn.execute(sql, params).await
    }

    /// Run a built statement as a query.
    pub async fn fetch(&self, statement: &Statement) -> Result<ResultSet, DeskError> {
        self.query(&statement.sql, &statement.params).await
    }

    /// Run a built statement as an update.
    pub async fn run(&self, statement: &Statement) -> Result<u64, DeskError> {
        self.execute(&statement.sql, &statement.params).await
    }

    /// Run statements in order on one connection, stopping at the first error.
    pub async fn run_all(&self, statements: &[Statement]) -> Result<(), DeskError> {
        let mut conn = self.acquire().await?;
        for statement in statements {
            tracing::debug!(
                database = %self.target.database,
                sql = %statement.sql,
                "Running update"
            );
            conn.execute(&statement.sql, &statement.params).await?;
        }
        Ok(())
    }

    /// First column of every row.
    pub async fn list(
        &self,
        sql: &str,
        params: &[Option<String>],
    ) -> Result<Vec<String>, DeskError> {
        Ok(self.query(sql, params).await?.first_column())
    }

    /// First value of the first row as a count; zero when there are no rows.
    pub async fn count(&self, sql: &str, params: &[Option<String>]) -> Result<u64, DeskError> {
        let rows = self.query(sql, params).await?;
        match rows.scalar() {
            None => Ok(0),
            Some(text) => text
                .trim()
                .parse()
                .map_err(|_| DeskError::internal(format!("Expected a row count, got '{text}'"))),
        }
    }
}

impl fmt::Debug for ConnectorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorContext")
            .field("target", &self.target)
            .field("product", &self.product.id)
            .finish()
    }
}

/// The contract every backend variant implements.
///
/// Provided methods hold the generic behavior; variants override what their
/// backend does differently. The free functions in [`standard`] are the same
/// behavior, callable from an override that extends it.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Shared target, product and pool.
    fn context(&self) -> &ConnectorContext;

    /// Which variant this is.
    fn kind(&self) -> ConnectorKind;

    /// Dialect used to build statements.
    fn dialect(&self) -> &dyn Dialect;

    // ========== Identifiers and capabilities ==========

    fn quote_table(&self, name: &str) -> String {
        self.dialect().quote_table(name)
    }

    fn quote_column(&self, name: &str) -> String {
        self.dialect().quote_column(name)
    }

    fn quote_type(&self, name: &str) -> String {
        self.dialect().quote_type(name)
    }

    /// Whether foreign keys can be introspected and added.
    fn supports_foreign_keys(&self) -> bool {
        true
    }

    /// Whether check constraints can be introspected and added.
    fn supports_check_constraints(&self) -> bool {
        false
    }

    /// Privileges accepted by grant and revoke.
    fn possible_privileges(&self) -> &'static [&'static str] {
        self.dialect().possible_privileges()
    }

    /// Function overrides accepted in row writes.
    fn get_function_list(&self) -> &'static [&'static str] {
        self.dialect().allowed_functions()
    }

    fn get_limit_clause(&self, start: u64, count: u64) -> Option<String> {
        self.dialect().limit_clause(start, count)
    }

    /// Type to edit a column of `sql_type` as.
    fn get_effective_type(&self, sql_type: &str) -> String {
        standard::effective_type(sql_type)
    }

    /// Readable form of a referential rule code.
    fn get_rule_description(&self, rule: &str) -> String {
        standard::rule_description(rule)
    }

    /// Search filter for a browse; `None` when no criterion applies.
    fn get_select_where_clause(&self, criteria: &[KeyValue]) -> Option<String> {
        statement::select_where_clause(self.dialect(), criteria)
    }

    /// Connection URL of the target (without credentials).
    fn get_url(&self) -> Result<String, DeskError> {
        self.context().product().connection_url(self.context().target())
    }

    /// Name and version of the client driver.
    fn get_driver_name(&self) -> Result<String, DeskError> {
        standard::driver_name(self)
    }

    // ========== Catalog ==========

    async fn get_database_product_name(&self) -> Result<String, DeskError> {
        standard::database_product_name(self).await
    }

    async fn get_tables(&self) -> Result<Vec<String>, DeskError> {
        standard::get_tables(self).await
    }

    async fn get_databases(&self) -> Result<Vec<String>, DeskError> {
        standard::get_databases(self).await
    }

    async fn get_types(&self) -> Result<Vec<String>, DeskError> {
        Ok(standard::STANDARD_TYPES.iter().map(|t| t.to_string()).collect())
    }

    /// One entry per physical column, in native column order.
    async fn get_columns(&self, table: &str) -> Result<Columns, DeskError> {
        standard::get_columns(self, table).await
    }

    async fn get_indexes(&self, table: &str) -> Result<Indexes, DeskError> {
        standard::get_indexes(self, table).await
    }

    async fn get_primary_keys(&self, table: &str) -> Result<PrimaryKeys, DeskError> {
        standard::get_primary_keys(self, table).await
    }

    /// Foreign keys of `table`; `None` when it has none.
    async fn get_imported_keys(&self, table: &str) -> Result<Option<ForeignKeys>, DeskError> {
        standard::get_foreign_keys(self, table, true).await
    }

    /// Foreign keys of other tables referencing `table`; `None` when there are none.
    async fn get_exported_keys(&self, table: &str) -> Result<Option<ForeignKeys>, DeskError> {
        standard::get_foreign_keys(self, table, false).await
    }

    /// Check constraints; `None` where the backend does not support them.
    async fn get_check_constraints(
        &self,
        _table: &str,
    ) -> Result<Option<CheckConstraints>, DeskError> {
        Ok(None)
    }

    async fn get_table_privileges(&self, table: &str) -> Result<TablePrivileges, DeskError> {
        standard::get_table_privileges(self, table).await
    }

    /// Values a column can take, when the backend can enumerate them.
    async fn get_possible_values(
        &self,
        _table: &str,
        _column: &str,
        _sql_type: &str,
    ) -> Result<Option<Vec<String>>, DeskError> {
        Ok(None)
    }

    /// Tables with their columns and foreign key references.
    async fn get_database_schema(&self) -> Result<Vec<SchemaTable>, DeskError> {
        standard::get_database_schema(self).await
    }

    async fn count_records(&self, table: &str) -> Result<u64, DeskError> {
        standard::count_records(self, table).await
    }

    // ========== Rows ==========

    /// Placeholder syntax for binding values to `table`'s columns.
    async fn placeholders(&self, _table: &str) -> Result<Placeholders, DeskError> {
        Ok(Placeholders::plain())
    }

    async fn insert_row(&self, table: &str, values: &[ColumnValue]) -> Result<u64, DeskError> {
        standard::insert_row(self, table, values).await
    }

    async fn edit_row(
        &self,
        table: &str,
        values: &[ColumnValue],
        keys: &[KeyValue],
    ) -> Result<u64, DeskError> {
        standard::edit_row(self, table, values, keys).await
    }

    async fn delete_row(&self, table: &str, keys: &[KeyValue]) -> Result<u64, DeskError> {
        standard::delete_row(self, table, keys).await
    }

    /// Values of the row identified by `keys`, in result column order; empty when no row matches.
    async fn get_row(
        &self,
        table: &str,
        keys: &[KeyValue],
    ) -> Result<Vec<Option<String>>, DeskError> {
        standard::get_row(self, table, keys).await
    }

    /// Browse `count` rows starting at `start`.
    async fn get_rows(
        &self,
        table: &str,
        where_clause: Option<&str>,
        order_by: Option<&str>,
        start: u64,
        count: u64,
    ) -> Result<ResultSet, DeskError> {
        standard::get_rows(self, table, where_clause, order_by, start, count).await
    }

    async fn empty_table(&self, table: &str) -> Result<u64, DeskError> {
        standard::empty_table(self, table).await
    }

    /// Write one `INSERT` statement per row.
    async fn dump_table_contents(
        &self,
        table: &str,
        out: &mut (dyn Write + Send),
    ) -> Result<(), DeskError> {
        standard::dump_table_contents(self, table, out).await
    }

    /// Write a `CREATE TABLE` statement rebuilt from the catalog.
    async fn dump_table_structure(
        &self,
        table: &str,
        out: &mut (dyn Write + Send),
    ) -> Result<(), DeskError> {
        standard::dump_table_structure(self, table, out).await
    }

    // ========== DDL ==========

    async fn create_table(&self, table: &str, columns: &[NewColumn]) -> Result<(), DeskError> {
        standard::create_table(self, table, columns).await
    }

    async fn add_column(&self, table: &str, column: &ColumnDefinition) -> Result<(), DeskError> {
        standard::add_column(self, table, column).await
    }

    /// Change `column` to match `definition`, renaming it if the names differ.
    async fn edit_column(
        &self,
        table: &str,
        column: &str,
        definition: &ColumnDefinition,
    ) -> Result<(), DeskError> {
        standard::edit_column(self, table, column, definition).await
    }

    async fn delete_column(&self, table: &str, column: &str) -> Result<(), DeskError> {
        standard::delete_column(self, table, column).await
    }

    async fn add_index(&self, table: &str, index: &str, column: &str) -> Result<(), DeskError> {
        standard::add_index(self, table, index, column, false).await
    }

    async fn add_unique_index(
        &self,
        table: &str,
        index: &str,
        column: &str,
    ) -> Result<(), DeskError> {
        standard::add_index(self, table, index, column, true).await
    }

    /// Extend the primary key with `column`.
    async fn add_primary_key(&self, table: &str, column: &str) -> Result<(), DeskError> {
        standard::add_primary_key(self, table, column).await
    }

    /// Remove `column` from the primary key.
    async fn drop_primary_key(&self, table: &str, column: &str) -> Result<(), DeskError> {
        standard::drop_primary_key(self, table, column).await
    }

    async fn add_foreign_key(
        &self,
        table: &str,
        key: &ForeignKeyDefinition,
    ) -> Result<(), DeskError> {
        standard::add_foreign_key(self, table, key, true).await
    }

    async fn add_check_constraint(
        &self,
        table: &str,
        constraint: &str,
        clause: &str,
    ) -> Result<(), DeskError> {
        standard::add_check_constraint(self, table, constraint, clause).await
    }

    async fn drop_constraint(
        &self,
        table: &str,
        constraint: &str,
        behavior: DropBehavior,
    ) -> Result<(), DeskError> {
        standard::drop_constraint(self, table, constraint, behavior).await
    }

    async fn drop_index(&self, table: &str, index: &str) -> Result<(), DeskError> {
        standard::drop_index(self, table, index).await
    }

    async fn drop_table(&self, table: &str) -> Result<(), DeskError> {
        standard::drop_table(self, table).await
    }

    async fn rename_table(&self, table: &str, new_name: &str) -> Result<(), DeskError> {
        standard::rename_table(self, table, new_name).await
    }

    async fn create_database(&self, database: &str) -> Result<(), DeskError> {
        standard::create_database(self, database).await
    }

    async fn drop_database(&self, database: &str) -> Result<(), DeskError> {
        standard::drop_database(self, database).await
    }

    // ========== Privileges ==========

    async fn grant_privileges(
        &self,
        table: &str,
        grantee: &str,
        privileges: &[&str],
    ) -> Result<(), DeskError> {
        standard::grant_privileges(self, table, grantee, privileges).await
    }

    async fn revoke_privileges(
        &self,
        table: &str,
        grantee: &str,
        privileges: &[&str],
    ) -> Result<(), DeskError> {
        standard::revoke_privileges(self, table, grantee, privileges).await
    }
}
