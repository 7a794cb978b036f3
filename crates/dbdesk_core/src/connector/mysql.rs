//! MySQL connector.
//!
//! Introspection goes through `SHOW` statements, which report enum and set
//! members, auto increment columns and MySQL's own type spelling. Foreign
//! keys come from `information_schema` since `SHOW` has no form for them.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::connector::dialect::{Dialect, MySqlDialect};
use crate::connector::standard::{self, AUTO_INCREMENT_REMARK};
use crate::connector::statement::{self, Statement};
use crate::connector::{Connector, ConnectorContext, ConnectorKind};
use crate::error::DeskError;
use crate::models::{
    Columns, DefaultValue, DropBehavior, ForeignKey, ForeignKeyDefinition, ForeignKeys, Indexes,
    MetaBool, PrimaryKeys, TablePrivileges,
};

/// Types offered for new columns.
pub const MYSQL_TYPES: &[&str] = &[
    "TINYINT",
    "SMALLINT",
    "MEDIUMINT",
    "INT",
    "BIGINT",
    "FLOAT",
    "DOUBLE",
    "DECIMAL",
    "DATE",
    "DATETIME",
    "TIMESTAMP",
    "TIME",
    "YEAR",
    "CHAR",
    "VARCHAR",
    "TINYBLOB",
    "TINYTEXT",
    "BLOB",
    "TEXT",
    "MEDIUMBLOB",
    "MEDIUMTEXT",
    "LONGBLOB",
    "LONGTEXT",
    "ENUM",
    "SET",
];

/// `base(length) suffix`, e.g. `int(10) unsigned zerofill`.
static COLUMN_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z][A-Za-z ]*?)\s*(?:\((.*)\))?(?:\s+([A-Za-z][A-Za-z ]*?))?\s*$")
        .expect("valid column type pattern")
});

/// Connector for MySQL and MariaDB.
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    context: ConnectorContext,
}

impl MySqlConnector {
    pub fn new(context: ConnectorContext) -> Self {
        Self { context }
    }

    /// Run `statement` followed by `FLUSH PRIVILEGES` on one connection.
    async fn run_flushed(&self, sql: String) -> Result<(), DeskError> {
        self.context.run_all(&[Statement::new(sql), Statement::new("FLUSH PRIVILEGES")]).await
    }
}

/// Split a `SHOW COLUMNS` type into the upper-case type name and its length or value list.
fn split_type(column_type: &str) -> (String, Option<String>) {
    let captures = COLUMN_TYPE.captures(column_type);
    let Some(captures) = captures else {
        return (column_type.trim().to_ascii_uppercase(), None);
    };
    let mut sql_type = captures.get(1).map_or("", |m| m.as_str()).to_ascii_uppercase();
    if let Some(suffix) = captures.get(3) {
        sql_type.push(' ');
        sql_type.push_str(&suffix.as_str().to_ascii_uppercase());
    }
    let length = captures.get(2).map(|m| m.as_str().to_string()).filter(|l| !l.is_empty());
    (sql_type, length)
}

/// Members of an `enum(...)` or `set(...)` type, with doubled quotes undone.
fn enum_values(column_type: &str) -> Option<Vec<String>> {
    let lower = column_type.trim_start().to_ascii_lowercase();
    if !lower.starts_with("enum") && !lower.starts_with("set") {
        return None;
    }
    let (_, list) = split_type(column_type);
    let list = list?;

    let mut values = Vec::new();
    let mut current = String::new();
    let mut chars = list.chars().peekable();
    let mut quoted = false;
    while let Some(ch) = chars.next() {
        match (quoted, ch) {
            (false, '\'') => quoted = true,
            (true, '\'') if chars.peek() == Some(&'\'') => {
                chars.next();
                current.push('\'');
            }
            (true, '\'') => {
                quoted = false;
                values.push(std::mem::take(&mut current));
            }
            (true, '\\') => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            (true, _) => current.push(ch),
            (false, _) => {}
        }
    }
    Some(values)
}

fn column_default(value: Option<&str>, extra: &str) -> Option<DefaultValue> {
    let value = value?;
    let upper = value.to_ascii_uppercase();
    if extra.to_ascii_uppercase().contains("DEFAULT_GENERATED")
        || upper.starts_with("CURRENT_TIMESTAMP")
        || upper == "NOW()"
    {
        Some(DefaultValue::Function(value.to_string()))
    } else {
        Some(DefaultValue::Literal(value.to_string()))
    }
}

/// `Non_unique` flipped so `True` means unique.
fn unique_flag(non_unique: Option<&str>) -> MetaBool {
    match MetaBool::parse(non_unique) {
        MetaBool::True => MetaBool::False,
        MetaBool::False => MetaBool::True,
        other => other,
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    fn context(&self) -> &ConnectorContext {
        &self.context
    }

    fn kind(&self) -> ConnectorKind {
        ConnectorKind::MySql
    }

    fn dialect(&self) -> &dyn Dialect {
        &MySqlDialect
    }

    async fn get_tables(&self) -> Result<Vec<String>, DeskError> {
        self.context.list("SHOW TABLES", &[]).await
    }

    async fn get_databases(&self) -> Result<Vec<String>, DeskError> {
        self.context.list("SHOW DATABASES", &[]).await
    }

    async fn get_types(&self) -> Result<Vec<String>, DeskError> {
        Ok(MYSQL_TYPES.iter().map(|t| t.to_string()).collect())
    }

    async fn get_columns(&self, table: &str) -> Result<Columns, DeskError> {
        let sql = format!("SHOW FULL COLUMNS FROM {}", self.quote_table(table));
        let rows = self.context.query(&sql, &[]).await?;

        let mut columns = Columns::default();
        for row in rows.iter() {
            let (sql_type, length) = split_type(&row.text("Type"));
            let extra = row.text("Extra");
            let remark = if extra.to_ascii_lowercase().contains(AUTO_INCREMENT_REMARK) {
                Some(AUTO_INCREMENT_REMARK.to_string())
            } else {
                row.get("Comment").filter(|c| !c.is_empty()).map(String::from)
            };
            columns.push(
                row.text("Field"),
                sql_type,
                length,
                MetaBool::parse(row.get("Null")),
                column_default(row.get("Default"), &extra),
                remark,
            );
        }
        Ok(columns)
    }

    async fn get_indexes(&self, table: &str) -> Result<Indexes, DeskError> {
        let sql = format!("SHOW INDEX FROM {}", self.quote_table(table));
        let rows = self.context.query(&sql, &[]).await?;
        let mut indexes = Indexes::default();
        for row in rows.iter() {
            indexes.push(
                row.text("Key_name"),
                unique_flag(row.get("Non_unique")),
                row.text("Column_name"),
            );
        }
        Ok(indexes)
    }

    async fn get_primary_keys(&self, table: &str) -> Result<PrimaryKeys, DeskError> {
        let sql = format!("SHOW INDEX FROM {}", self.quote_table(table));
        let rows = self.context.query(&sql, &[]).await?;
        let mut keys = PrimaryKeys::default();
        for row in rows.iter().filter(|r| r.get("Key_name") == Some("PRIMARY")) {
            keys.push(row.text("Column_name"), "PRIMARY");
        }
        Ok(keys)
    }

    async fn get_imported_keys(&self, table: &str) -> Result<Option<ForeignKeys>, DeskError> {
        self.foreign_keys(table, "k.TABLE_NAME").await
    }

    async fn get_exported_keys(&self, table: &str) -> Result<Option<ForeignKeys>, DeskError> {
        self.foreign_keys(table, "k.REFERENCED_TABLE_NAME").await
    }

    async fn get_table_privileges(&self, table: &str) -> Result<TablePrivileges, DeskError> {
        let rows = self
            .context
            .query(
                "SELECT GRANTEE AS grantee, PRIVILEGE_TYPE AS privilege_type, \
                 IS_GRANTABLE AS is_grantable \
                 FROM information_schema.TABLE_PRIVILEGES \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
                 ORDER BY GRANTEE, PRIVILEGE_TYPE",
                &[Some(table.to_string())],
            )
            .await?;
        let mut privileges = TablePrivileges::default();
        for row in rows.iter() {
            privileges.push(
                None,
                row.text("grantee"),
                row.text("privilege_type"),
                MetaBool::parse(row.get("is_grantable")),
            );
        }
        Ok(privileges)
    }

    /// Enum and set members as declared.
    async fn get_possible_values(
        &self,
        table: &str,
        column: &str,
        sql_type: &str,
    ) -> Result<Option<Vec<String>>, DeskError> {
        let lower = sql_type.trim().to_ascii_lowercase();
        if !lower.starts_with("enum") && !lower.starts_with("set") {
            return Ok(None);
        }
        let sql = format!(
            "SHOW COLUMNS FROM {} LIKE {}",
            self.quote_table(table),
            self.dialect().escape_literal(column)
        );
        let rows = self.context.query(&sql, &[]).await?;
        let values = rows
            .iter()
            .find(|row| row.get("Field") == Some(column))
            .and_then(|row| enum_values(&row.text("Type")));
        Ok(values)
    }

    async fn add_foreign_key(
        &self,
        table: &str,
        key: &ForeignKeyDefinition,
    ) -> Result<(), DeskError> {
        standard::add_foreign_key(self, table, key, false).await
    }

    /// MySQL names foreign keys explicitly when dropping them.
    async fn drop_constraint(
        &self,
        table: &str,
        constraint: &str,
        _behavior: DropBehavior,
    ) -> Result<(), DeskError> {
        let sql = format!(
            "ALTER TABLE {} DROP FOREIGN KEY {}",
            self.quote_table(table),
            self.quote_column(constraint)
        );
        self.context.run(&Statement::new(sql)).await?;
        Ok(())
    }

    async fn rename_table(&self, table: &str, new_name: &str) -> Result<(), DeskError> {
        let sql = format!(
            "ALTER TABLE {} RENAME {}",
            self.quote_table(table),
            self.quote_table(new_name)
        );
        self.context.run(&Statement::new(sql)).await?;
        Ok(())
    }

    async fn grant_privileges(
        &self,
        table: &str,
        grantee: &str,
        privileges: &[&str],
    ) -> Result<(), DeskError> {
        let sql = format!(
            "GRANT {} ON {} TO {}",
            statement::privilege_list(self.dialect(), privileges)?,
            self.quote_table(table),
            self.dialect().grantee(grantee)
        );
        self.run_flushed(sql).await
    }

    async fn revoke_privileges(
        &self,
        table: &str,
        grantee: &str,
        privileges: &[&str],
    ) -> Result<(), DeskError> {
        let sql = format!(
            "REVOKE {} ON {} FROM {}",
            statement::privilege_list(self.dialect(), privileges)?,
            self.quote_table(table),
            self.dialect().grantee(grantee)
        );
        self.run_flushed(sql).await
    }
}

impl MySqlConnector {
    async fn foreign_keys(
        &self,
        table: &str,
        filter: &str,
    ) -> Result<Option<ForeignKeys>, DeskError> {
        let sql = format!(
            "SELECT k.CONSTRAINT_NAME AS constraint_name, k.TABLE_NAME AS foreign_table, \
             k.COLUMN_NAME AS foreign_column, k.REFERENCED_TABLE_NAME AS primary_table, \
             k.REFERENCED_COLUMN_NAME AS primary_column, r.UPDATE_RULE AS update_rule, \
             r.DELETE_RULE AS delete_rule, r.MATCH_OPTION AS match_option \
             FROM information_schema.KEY_COLUMN_USAGE k \
             JOIN information_schema.REFERENTIAL_CONSTRAINTS r \
             ON r.CONSTRAINT_SCHEMA = k.CONSTRAINT_SCHEMA \
             AND r.CONSTRAINT_NAME = k.CONSTRAINT_NAME \
             WHERE k.TABLE_SCHEMA = DATABASE() AND {filter} = ? \
             ORDER BY k.REFERENCED_TABLE_NAME, k.CONSTRAINT_NAME, k.ORDINAL_POSITION"
        );
        let rows = self.context.query(&sql, &[Some(table.to_string())]).await?;
        let entries = rows
            .iter()
            .map(|row| ForeignKey {
                constraint: row.text("constraint_name"),
                foreign_table: row.text("foreign_table"),
                foreign_column: row.text("foreign_column"),
                primary_table: row.text("primary_table"),
                primary_column: row.text("primary_column"),
                update_rule: row.get("update_rule").map(|r| self.get_rule_description(r)),
                delete_rule: row.get("delete_rule").map(|r| self.get_rule_description(r)),
                match_option: row.get("match_option").map(String::from),
                deferrable: MetaBool::NotApplicable,
                initially_deferred: MetaBool::NotApplicable,
            })
            .collect();
        Ok(ForeignKeys::non_empty(entries))
    }
}
