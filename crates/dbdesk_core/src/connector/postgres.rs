//! PostgreSQL connector.
//!
//! Reads `pg_catalog` directly. Parameters are sent as text, so every
//! placeholder in a row statement carries a cast to the column's type.

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::connector::dialect::{Dialect, PostgresDialect};
use crate::connector::statement::{self, Placeholders, Statement};
use crate::connector::{Connector, ConnectorContext, ConnectorKind};
use crate::error::DeskError;
use crate::models::{
    CheckConstraints, ColumnDefinition, Columns, DefaultValue, ForeignKey, ForeignKeys, Indexes,
    MetaBool, NewColumn, NullClause, PrimaryKeys,
};

/// Unsigned or parenthesized negative number, optionally cast.
static NUMERIC_DEFAULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\(?(-?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?)\)?(?:::[\w ]+)?$")
        .expect("valid numeric default pattern")
});

/// Restricts a `pg_class` alias to the named, visible relation.
fn visible(alias: &str) -> String {
    format!("{alias}.relname = ?::name AND pg_catalog.pg_table_is_visible({alias}.oid)")
}

/// Connector for PostgreSQL.
#[derive(Debug, Clone)]
pub struct PostgresConnector {
    context: ConnectorContext,
}

impl PostgresConnector {
    pub fn new(context: ConnectorContext) -> Self {
        Self { context }
    }

    fn table_param(table: &str) -> [Option<String>; 1] {
        [Some(table.to_string())]
    }

    async fn foreign_keys(
        &self,
        table: &str,
        side: &str,
    ) -> Result<Option<ForeignKeys>, DeskError> {
        let sql = format!(
            "SELECT con.conname AS constraint_name, \
             fc.relname AS foreign_table, fa.attname AS foreign_column, \
             pc.relname AS primary_table, pa.attname AS primary_column, \
             con.confupdtype AS update_rule, con.confdeltype AS delete_rule, \
             con.confmatchtype AS match_type, \
             con.condeferrable AS deferrable, con.condeferred AS initially_deferred \
             FROM pg_catalog.pg_constraint con \
             JOIN pg_catalog.pg_class fc ON fc.oid = con.conrelid \
             JOIN pg_catalog.pg_class pc ON pc.oid = con.confrelid \
             CROSS JOIN LATERAL generate_subscripts(con.conkey, 1) AS k(i) \
             JOIN pg_catalog.pg_attribute fa \
             ON fa.attrelid = con.conrelid AND fa.attnum = con.conkey[k.i] \
             JOIN pg_catalog.pg_attribute pa \
             ON pa.attrelid = con.confrelid AND pa.attnum = con.confkey[k.i] \
             WHERE con.contype = 'f' AND {} \
             ORDER BY pc.relname, con.conname, k.i",
            visible(side)
        );
        let rows = self.context.query(&sql, &Self::table_param(table)).await?;
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
                match_option: row.get("match_type").map(match_description),
                deferrable: MetaBool::parse(row.get("deferrable")),
                initially_deferred: MetaBool::parse(row.get("initially_deferred")),
            })
            .collect();
        Ok(ForeignKeys::non_empty(entries))
    }

    /// Whether `column` alone makes up a unique index.
    fn has_single_column_unique(indexes: &Indexes, column: &str) -> bool {
        indexes.indexes_on(column).into_iter().any(|name| {
            let members: Vec<usize> = (0..indexes.len())
                .filter(|i| indexes.names()[*i] == name)
                .collect();
            members.len() == 1 && indexes.unique()[members[0]].is_true()
        })
    }

    fn key_columns(&self, columns: &[String]) -> String {
        columns.iter().map(|c| self.quote_column(c)).collect::<Vec<_>>().join(",")
    }

    /// Primary key constraint name, when the table has one.
    async fn primary_key_constraint(
        &self,
        table: &str,
    ) -> Result<(PrimaryKeys, Option<String>), DeskError> {
        let keys = self.get_primary_keys(table).await?;
        let name = keys.constraint_name().map(|n| self.quote_column(n));
        Ok((keys, name))
    }
}

/// Readable form of a `confmatchtype` code.
fn match_description(code: &str) -> String {
    match code {
        "f" => "FULL",
        "p" => "PARTIAL",
        "s" | "u" => "SIMPLE",
        other => other,
    }
    .to_string()
}

/// Declared length from an attribute type modifier.
fn type_length(type_name: &str, typmod: Option<&str>) -> Option<String> {
    let typmod: i32 = typmod?.parse().ok()?;
    if typmod < 0 {
        return None;
    }
    match type_name {
        "varchar" | "bpchar" => Some((typmod - 4).to_string()),
        "numeric" => {
            let packed = typmod - 4;
            Some(format!("{},{}", (packed >> 16) & 0xffff, packed & 0xffff))
        }
        "bit" | "varbit" => Some(typmod.to_string()),
        _ => None,
    }
}

/// Split a `pg_get_expr` default into a literal or a function expression.
fn classify_default(expr: Option<&str>) -> Option<DefaultValue> {
    let expr = expr?.trim();
    if expr.is_empty() || expr.eq_ignore_ascii_case("NULL") || expr.starts_with("NULL::") {
        return None;
    }
    if let Some(literal) = quoted_literal(expr) {
        return Some(DefaultValue::Literal(literal));
    }
    if expr == "true" || expr == "false" {
        return Some(DefaultValue::Literal(expr.to_string()));
    }
    if let Some(number) = NUMERIC_DEFAULT.captures(expr).and_then(|c| c.get(1)) {
        return Some(DefaultValue::Literal(number.as_str().to_string()));
    }
    Some(DefaultValue::Function(expr.to_string()))
}

/// `'text'` or `'text'::type` unescaped; `None` for anything else.
fn quoted_literal(expr: &str) -> Option<String> {
    let body = expr.strip_prefix('\'')?;
    let mut value = String::new();
    let mut chars = body.char_indices().peekable();
    while let Some((i, ch)) = chars.next() {
        if ch != '\'' {
            value.push(ch);
            continue;
        }
        if chars.peek().map(|(_, c)| *c) == Some('\'') {
            chars.next();
            value.push('\'');
            continue;
        }
        let rest = &body[i + 1..];
        let cast_only = match rest.strip_prefix("::") {
            Some(cast) => cast
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | ' ' | '"' | '.' | '[' | ']')),
            None => rest.is_empty(),
        };
        return cast_only.then_some(value);
    }
    None
}

/// Cast type for a text parameter bound to a column of `type_name`.
fn cast_type(type_name: &str) -> &str {
    match type_name {
        "serial" | "serial4" => "integer",
        "bigserial" | "serial8" => "bigint",
        "smallserial" | "serial2" => "smallint",
        other => other,
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    fn context(&self) -> &ConnectorContext {
        &self.context
    }

    fn kind(&self) -> ConnectorKind {
        ConnectorKind::PostgreSql
    }

    fn dialect(&self) -> &dyn Dialect {
        &PostgresDialect
    }

    fn supports_check_constraints(&self) -> bool {
        true
    }

    async fn get_tables(&self) -> Result<Vec<String>, DeskError> {
        self.context
            .list(
                "SELECT c.relname FROM pg_catalog.pg_class c \
                 JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
                 WHERE c.relkind IN ('r', 'v', 'p') \
                 AND n.nspname NOT IN ('pg_catalog', 'information_schema') \
                 AND n.nspname NOT LIKE 'pg_toast%' \
                 AND pg_catalog.pg_table_is_visible(c.oid) \
                 ORDER BY c.relname",
                &[],
            )
            .await
    }

    async fn get_databases(&self) -> Result<Vec<String>, DeskError> {
        self.context
            .list(
                "SELECT datname FROM pg_catalog.pg_database \
                 WHERE NOT datistemplate ORDER BY datname",
                &[],
            )
            .await
    }

    async fn get_types(&self) -> Result<Vec<String>, DeskError> {
        self.context
            .list(
                "SELECT typname FROM pg_catalog.pg_type \
                 WHERE typtype IN ('b', 'e', 'd') AND typname NOT LIKE '\\_%' \
                 ORDER BY typname",
                &[],
            )
            .await
    }

    async fn get_columns(&self, table: &str) -> Result<Columns, DeskError> {
        let sql = format!(
            "SELECT a.attname AS name, t.typname AS type, \
             a.atttypmod AS typmod, a.attnotnull AS notnull, \
             pg_catalog.pg_get_expr(d.adbin, d.adrelid) AS default_value, \
             pg_catalog.col_description(c.oid, a.attnum) AS remark \
             FROM pg_catalog.pg_attribute a \
             JOIN pg_catalog.pg_class c ON c.oid = a.attrelid \
             JOIN pg_catalog.pg_type t ON t.oid = a.atttypid \
             LEFT JOIN pg_catalog.pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum \
             WHERE {} AND a.attnum > 0 AND NOT a.attisdropped \
             ORDER BY a.attnum",
            visible("c")
        );
        let rows = self.context.query(&sql, &Self::table_param(table)).await?;

        let mut columns = Columns::default();
        for row in rows.iter() {
            let type_name = row.text("type");
            let nullable = match MetaBool::parse(row.get("notnull")) {
                MetaBool::True => MetaBool::False,
                MetaBool::False => MetaBool::True,
                other => other,
            };
            columns.push(
                row.text("name"),
                type_name.clone(),
                type_length(&type_name, row.get("typmod")),
                nullable,
                classify_default(row.get("default_value")),
                row.get("remark").map(String::from),
            );
        }
        Ok(columns)
    }

    async fn get_indexes(&self, table: &str) -> Result<Indexes, DeskError> {
        let sql = format!(
            "SELECT ic.relname AS index_name, i.indisunique AS is_unique, a.attname AS column_name \
             FROM pg_catalog.pg_index i \
             JOIN pg_catalog.pg_class c ON c.oid = i.indrelid \
             JOIN pg_catalog.pg_class ic ON ic.oid = i.indexrelid \
             JOIN pg_catalog.pg_attribute a ON a.attrelid = c.oid AND a.attnum = ANY(i.indkey) \
             WHERE {} \
             ORDER BY ic.relname, array_position(i.indkey::int2[], a.attnum)",
            visible("c")
        );
        let rows = self.context.query(&sql, &Self::table_param(table)).await?;
        let mut indexes = Indexes::default();
        for row in rows.iter() {
            indexes.push(
                row.text("index_name"),
                MetaBool::parse(row.get("is_unique")),
                row.text("column_name"),
            );
        }
        Ok(indexes)
    }

    async fn get_primary_keys(&self, table: &str) -> Result<PrimaryKeys, DeskError> {
        let sql = format!(
            "SELECT a.attname AS column_name, con.conname AS constraint_name \
             FROM pg_catalog.pg_constraint con \
             JOIN pg_catalog.pg_class c ON c.oid = con.conrelid \
             JOIN pg_catalog.pg_attribute a ON a.attrelid = c.oid AND a.attnum = ANY(con.conkey) \
             WHERE con.contype = 'p' AND {} \
             ORDER BY array_position(con.conkey, a.attnum)",
            visible("c")
        );
        let rows = self.context.query(&sql, &Self::table_param(table)).await?;
        let mut keys = PrimaryKeys::default();
        for row in rows.iter() {
            keys.push(row.text("column_name"), row.text("constraint_name"));
        }
        Ok(keys)
    }

    async fn get_imported_keys(&self, table: &str) -> Result<Option<ForeignKeys>, DeskError> {
        self.foreign_keys(table, "fc").await
    }

    async fn get_exported_keys(&self, table: &str) -> Result<Option<ForeignKeys>, DeskError> {
        self.foreign_keys(table, "pc").await
    }

    async fn get_check_constraints(
        &self,
        table: &str,
    ) -> Result<Option<CheckConstraints>, DeskError> {
        let sql = format!(
            "SELECT con.conname AS name, pg_catalog.pg_get_constraintdef(con.oid) AS definition \
             FROM pg_catalog.pg_constraint con \
             JOIN pg_catalog.pg_class c ON c.oid = con.conrelid \
             WHERE con.contype = 'c' AND {} \
             ORDER BY con.conname",
            visible("c")
        );
        let rows = self.context.query(&sql, &Self::table_param(table)).await?;
        let mut checks = CheckConstraints::default();
        for row in rows.iter() {
            let definition = row.text("definition");
            let clause = definition
                .strip_prefix("CHECK ")
                .and_then(|c| c.strip_prefix('('))
                .and_then(|c| c.strip_suffix(')'))
                .unwrap_or(&definition);
            checks.push(row.text("name"), clause);
        }
        Ok(Some(checks))
    }

    /// `true`/`false` for booleans; otherwise the referenced values of a
    /// foreign key column when the referenced table is small enough.
    async fn get_possible_values(
        &self,
        table: &str,
        column: &str,
        sql_type: &str,
    ) -> Result<Option<Vec<String>>, DeskError> {
        if matches!(sql_type.trim().to_ascii_lowercase().as_str(), "bool" | "boolean") {
            return Ok(Some(vec!["true".to_string(), "false".to_string()]));
        }
        let limit = self.context.product().foreign_key_rows;
        if limit == 0 {
            return Ok(None);
        }
        let Some(keys) = self.get_imported_keys(table).await? else {
            return Ok(None);
        };
        let Some(key) = keys.foreign_id(column).and_then(|i| keys.get(i)) else {
            return Ok(None);
        };
        if self.count_records(&key.primary_table).await? > limit {
            return Ok(None);
        }

        let referenced = self.quote_column(&key.primary_column);
        let mut sql = format!("SELECT {referenced} FROM {}", self.quote_table(&key.primary_table));
        let indexes = self.get_indexes(table).await?;
        if Self::has_single_column_unique(&indexes, column) {
            // Values already taken cannot be used again.
            let own = self.quote_column(column);
            sql.push_str(&format!(
                " WHERE {referenced} NOT IN (SELECT {own} FROM {} WHERE {own} IS NOT NULL)",
                self.quote_table(table)
            ));
        }
        sql.push_str(&format!(" ORDER BY {referenced}"));

        let values = self.context.list(&sql, &[]).await?;
        Ok(if values.is_empty() { None } else { Some(values) })
    }

    async fn placeholders(&self, table: &str) -> Result<Placeholders, DeskError> {
        let columns = self.get_columns(table).await?;
        let casts: HashMap<String, String> = columns
            .names()
            .iter()
            .zip(columns.types())
            .map(|(name, type_name)| (name.clone(), cast_type(type_name).to_string()))
            .collect();
        Ok(Placeholders::with_casts(casts))
    }

    /// Unique columns are marked inline; plain indexes need their own statements.
    async fn create_table(&self, table: &str, columns: &[NewColumn]) -> Result<(), DeskError> {
        if columns.is_empty() {
            return Err(DeskError::invalid_input("A table needs at least one column"));
        }
        let dialect = self.dialect();
        let mut parts = Vec::with_capacity(columns.len() + 1);
        for column in columns {
            let mut definition = statement::column_definition(dialect, &column.definition)?;
            if column.unique {
                definition.push_str(" UNIQUE");
            }
            parts.push(definition);
        }
        let primary: Vec<String> =
            columns.iter().filter(|c| c.primary_key).map(|c| c.definition.name.clone()).collect();
        if !primary.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", self.key_columns(&primary)));
        }

        let quoted = self.quote_table(table);
        let mut statements = vec![Statement::new(format!(
            "CREATE TABLE {quoted} ({})",
            parts.join(", ")
        ))];
        for column in columns.iter().filter(|c| c.index) {
            let name = &column.definition.name;
            statements.push(Statement::new(format!(
                "CREATE INDEX {} ON {quoted} ({})",
                self.quote_column(&format!("{table}_{name}_idx")),
                self.quote_column(name)
            )));
        }
        self.context.run_all(&statements).await
    }

    /// Rename, retype, then adjust nullability and default.
    async fn edit_column(
        &self,
        table: &str,
        column: &str,
        definition: &ColumnDefinition,
    ) -> Result<(), DeskError> {
        if definition.auto_increment {
            return Err(DeskError::unsupported(
                "Auto increment columns are not supported; use a serial type",
            ));
        }
        let quoted = self.quote_table(table);
        let name = self.quote_column(&definition.name);
        let mut statements = Vec::with_capacity(4);
        if definition.name != column {
            statements.push(Statement::new(format!(
                "ALTER TABLE {quoted} RENAME COLUMN {} TO {name}",
                self.quote_column(column)
            )));
        }
        statements.push(Statement::new(format!(
            "ALTER TABLE {quoted} ALTER COLUMN {name} TYPE {}",
            statement::type_clause(&definition.sql_type, definition.length.as_deref())?
        )));
        statements.push(Statement::new(match definition.null {
            NullClause::NotNull => format!("ALTER TABLE {quoted} ALTER COLUMN {name} SET NOT NULL"),
            NullClause::Null => format!("ALTER TABLE {quoted} ALTER COLUMN {name} DROP NOT NULL"),
        }));
        statements.push(Statement::new(match &definition.default {
            Some(default) => format!(
                "ALTER TABLE {quoted} ALTER COLUMN {name} SET DEFAULT {}",
                statement::default_clause(self.dialect(), default)?
            ),
            None => format!("ALTER TABLE {quoted} ALTER COLUMN {name} DROP DEFAULT"),
        }));
        self.context.run_all(&statements).await
    }

    async fn add_index(&self, table: &str, index: &str, column: &str) -> Result<(), DeskError> {
        let sql = format!(
            "CREATE INDEX {} ON {} ({})",
            self.quote_column(index),
            self.quote_table(table),
            self.quote_column(column)
        );
        self.context.run(&Statement::new(sql)).await?;
        Ok(())
    }

    async fn add_unique_index(
        &self,
        table: &str,
        index: &str,
        column: &str,
    ) -> Result<(), DeskError> {
        let sql = format!(
            "CREATE UNIQUE INDEX {} ON {} ({})",
            self.quote_column(index),
            self.quote_table(table),
            self.quote_column(column)
        );
        self.context.run(&Statement::new(sql)).await?;
        Ok(())
    }

    async fn drop_index(&self, _table: &str, index: &str) -> Result<(), DeskError> {
        let sql = format!("DROP INDEX {}", self.quote_column(index));
        self.context.run(&Statement::new(sql)).await?;
        Ok(())
    }

    async fn add_primary_key(&self, table: &str, column: &str) -> Result<(), DeskError> {
        let (keys, constraint) = self.primary_key_constraint(table).await?;
        if keys.contains(column) {
            return Err(DeskError::invalid_input(format!(
                "{column} is already part of the primary key"
            )));
        }
        let mut columns = keys.columns().to_vec();
        columns.push(column.to_string());

        let drop = constraint.map(|c| format!("DROP CONSTRAINT {c}, ")).unwrap_or_default();
        let sql = format!(
            "ALTER TABLE {} {drop}ADD PRIMARY KEY ({})",
            self.quote_table(table),
            self.key_columns(&columns)
        );
        self.context.run(&Statement::new(sql)).await?;
        Ok(())
    }

    async fn drop_primary_key(&self, table: &str, column: &str) -> Result<(), DeskError> {
        let (keys, constraint) = self.primary_key_constraint(table).await?;
        let Some(constraint) = constraint.filter(|_| keys.contains(column)) else {
            return Err(DeskError::invalid_input(format!(
                "{column} is not part of the primary key"
            )));
        };
        let remaining: Vec<String> = keys
            .columns()
            .iter()
            .filter(|c| *c != column)
            .cloned()
            .collect();

        let quoted = self.quote_table(table);
        let sql = if remaining.is_empty() {
            format!("ALTER TABLE {quoted} DROP CONSTRAINT {constraint}")
        } else {
            format!(
                "ALTER TABLE {quoted} DROP CONSTRAINT {constraint}, ADD PRIMARY KEY ({})",
                self.key_columns(&remaining)
            )
        };
        self.context.run(&Statement::new(sql)).await?;
        Ok(())
    }

    /// A database cannot be dropped from a session connected to it, so the
    /// statement runs from `template1` after the pool lets go of `database`.
    async fn drop_database(&self, database: &str) -> Result<(), DeskError> {
        let target = self.context.target();
        let pool = self.context.pool();
        let closed = pool.close_database(&target.with_database(database)).await;
        tracing::debug!(database, closed, "Closed pooled connections before drop");

        let mut conn = pool.acquire(&target.with_database("template1")).await?;
        conn.execute(&format!("DROP DATABASE {}", self.quote_table(database)), &[]).await?;
        tracing::info!(database, "Dropped database");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnValue, KeyValue};
    use crate::testing::connector_for;

    const COLUMN_FIELDS: &[&str] = &[
        "name",
        "type",
        "typmod",
        "notnull",
        "default_value",
        "remark",
    ];

    #[test]
    fn test_classify_default() {
        assert_eq!(classify_default(None), None);
        assert_eq!(classify_default(Some("NULL::character varying")), None);
        assert_eq!(
            classify_default(Some("'it''s'::character varying")),
            Some(DefaultValue::Literal("it's".to_string()))
        );
        assert_eq!(classify_default(Some("42")), Some(DefaultValue::Literal("42".to_string())));
        assert_eq!(
            classify_default(Some("(-1.5)")),
            Some(DefaultValue::Literal("-1.5".to_string()))
        );
        assert_eq!(
            classify_default(Some("'7'::integer")),
            Some(DefaultValue::Literal("7".to_string()))
        );
        assert_eq!(classify_default(Some("true")), Some(DefaultValue::Literal("true".to_string())));
        assert_eq!(
            classify_default(Some("nextval('orders_id_seq'::regclass)")),
            Some(DefaultValue::Function("nextval('orders_id_seq'::regclass)".to_string()))
        );
        assert_eq!(
            classify_default(Some("now()")),
            Some(DefaultValue::Function("now()".to_string()))
        );
        assert_eq!(
            classify_default(Some("'a'::text || 'b'::text")),
            Some(DefaultValue::Function("'a'::text || 'b'::text".to_string()))
        );
    }

    #[test]
    fn test_type_length() {
        assert_eq!(type_length("varchar", Some("24")), Some("20".to_string()));
        assert_eq!(type_length("numeric", Some("655366")), Some("10,2".to_string()));
        assert_eq!(type_length("int4", Some("-1")), None);
        assert_eq!(type_length("text", None), None);
    }

    #[test]
    fn test_match_description() {
        assert_eq!(match_description("f"), "FULL");
        assert_eq!(match_description("s"), "SIMPLE");
    }

    #[tokio::test]
    async fn test_get_columns() {
        let (connector, driver) = connector_for("postgresql");
        driver.respond(
            "pg_attribute a",
            COLUMN_FIELDS,
            vec![
                vec![
                    Some("id"),
                    Some("int4"),
                    Some("-1"),
                    Some("true"),
                    Some("nextval('t_id_seq'::regclass)"),
                    None,
                ],
                vec![
                    Some("name"),
                    Some("varchar"),
                    Some("44"),
                    Some("false"),
                    Some("'anon'::character varying"),
                    Some("display name"),
                ],
            ],
        );
        let columns = connector.get_columns("t").await.unwrap();
        assert_eq!(columns.get_nullable("id"), MetaBool::False);
        assert_eq!(columns.get_nullable("name"), MetaBool::True);
        assert_eq!(columns.lengths(), [None, Some("40".to_string())]);
        assert!(columns.get_default("id").unwrap().is_function());
        assert_eq!(columns.get_remark("name"), Some("display name"));
        assert_eq!(driver.last().unwrap().params, vec![Some("t".to_string())]);
        assert!(driver.last().unwrap().sql.contains("c.relname = ?::name"));
    }

    #[tokio::test]
    async fn test_row_statements_cast_placeholders() {
        let (connector, driver) = connector_for("postgresql");
        driver.respond(
            "pg_attribute a",
            COLUMN_FIELDS,
            vec![
                vec![Some("id"), Some("serial"), None, Some("true"), None, None],
                vec![Some("seen"), Some("timestamptz"), None, Some("false"), None, None],
            ],
        );
        let values = vec![ColumnValue::value("seen", Some("2024-01-01 00:00:00+00"))];
        connector.edit_row("t", &values, &[KeyValue::new("id", Some("3"))]).await.unwrap();
        assert_eq!(
            driver.last().unwrap().sql,
            "UPDATE t SET seen=?::timestamptz WHERE id=?::integer"
        );
    }

    #[tokio::test]
    async fn test_limit_clause_and_null_test() {
        let (connector, driver) = connector_for("postgresql");
        connector.get_rows("t", Some("x IS NULL"), None, 20, 10).await.unwrap();
        assert_eq!(
            driver.last().unwrap().sql,
            "SELECT * FROM t WHERE x IS NULL LIMIT 10 OFFSET 20"
        );
        assert_eq!(
            connector.get_select_where_clause(&[KeyValue::new("x", None)]).as_deref(),
            Some("x IS NULL")
        );
    }

    #[tokio::test]
    async fn test_foreign_keys_decode_codes() {
        let (connector, driver) = connector_for("postgresql");
        driver.respond(
            "pg_constraint con",
            &[
                "constraint_name",
                "foreign_table",
                "foreign_column",
                "primary_table",
                "primary_column",
                "update_rule",
                "delete_rule",
                "match_type",
                "deferrable",
                "initially_deferred",
            ],
            vec![
                vec![
                    Some("fk2"),
                    Some("lines"),
                    Some("order_id"),
                    Some("orders"),
                    Some("id"),
                    Some("c"),
                    Some("r"),
                    Some("f"),
                    Some("true"),
                    Some("false"),
                ],
                vec![
                    Some("fk2"),
                    Some("lines"),
                    Some("shop"),
                    Some("orders"),
                    Some("shop"),
                    Some("c"),
                    Some("r"),
                    Some("f"),
                    Some("true"),
                    Some("false"),
                ],
            ],
        );
        let keys = connector.get_imported_keys("lines").await.unwrap().unwrap();
        assert_eq!(keys.len(), 2);
        let first = &keys.entries()[0];
        assert_eq!(first.update_rule.as_deref(), Some("CASCADE"));
        assert_eq!(first.delete_rule.as_deref(), Some("RESTRICT"));
        assert_eq!(first.match_option.as_deref(), Some("FULL"));
        assert_eq!(first.deferrable, MetaBool::True);
        assert_eq!(first.initially_deferred, MetaBool::False);
        assert!(driver.last().unwrap().sql.contains("fc.relname = ?::name"));
    }

    #[tokio::test]
    async fn test_check_constraints() {
        let (connector, driver) = connector_for("postgresql");
        assert_eq!(
            connector.get_check_constraints("t").await.unwrap(),
            Some(CheckConstraints::default())
        );

        driver.respond(
            "contype = 'c'",
            &["name", "definition"],
            vec![vec![Some("positive"), Some("CHECK ((qty > 0))")]],
        );
        let checks = connector.get_check_constraints("t").await.unwrap().unwrap();
        assert_eq!(checks.names(), ["positive"]);
        assert_eq!(checks.clauses(), ["(qty > 0)"]);

        connector.add_check_constraint("t", "positive", "qty > 0").await.unwrap();
        assert_eq!(
            driver.last().unwrap().sql,
            "ALTER TABLE t ADD CONSTRAINT positive CHECK (qty > 0)"
        );
        assert!(connector.add_check_constraint("t", "c", "1=1); DROP TABLE t").await.is_err());
    }

    #[tokio::test]
    async fn test_possible_values_for_bool_and_foreign_keys() {
        let (connector, driver) = connector_for("postgresql");
        assert_eq!(
            connector.get_possible_values("t", "flag", "bool").await.unwrap(),
            Some(vec!["true".to_string(), "false".to_string()])
        );
        assert!(driver.statements().is_empty());

        driver.respond(
            "pg_constraint con",
            &[
                "constraint_name",
                "foreign_table",
                "foreign_column",
                "primary_table",
                "primary_column",
            ],
            vec![vec![Some("fk"), Some("orders"), Some("state"), Some("states"), Some("code")]],
        );
        driver.respond("COUNT(*)", &["count"], vec![vec![Some("3")]]);
        driver.respond(
            "pg_index i",
            &["index_name", "is_unique", "column_name"],
            vec![vec![Some("orders_state_key"), Some("true"), Some("state")]],
        );
        driver.respond(
            "SELECT code FROM states",
            &["code"],
            vec![vec![Some("NY")], vec![Some("WA")]],
        );

        let values = connector.get_possible_values("orders", "state", "varchar").await.unwrap();
        assert_eq!(values, Some(vec!["NY".to_string(), "WA".to_string()]));
        assert_eq!(
            driver.last().unwrap().sql,
            "SELECT code FROM states WHERE code NOT IN \
             (SELECT state FROM orders WHERE state IS NOT NULL) ORDER BY code"
        );

        assert_eq!(connector.get_possible_values("orders", "other", "int4").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_possible_values_skip_large_tables() {
        let (connector, driver) = connector_for("postgresql");
        driver.respond(
            "pg_constraint con",
            &[
                "constraint_name",
                "foreign_table",
                "foreign_column",
                "primary_table",
                "primary_column",
            ],
            vec![vec![Some("fk"), Some("orders"), Some("cust"), Some("customers"), Some("id")]],
        );
        driver.respond("COUNT(*)", &["count"], vec![vec![Some("100000")]]);
        assert_eq!(connector.get_possible_values("orders", "cust", "int4").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_create_table_with_separate_indexes() {
        let (connector, driver) = connector_for("postgresql");
        let mut id = NewColumn::from(ColumnDefinition::new("id", "serial").not_null());
        id.primary_key = true;
        let mut email =
            NewColumn::from(ColumnDefinition::new("email", "varchar").with_length("80"));
        email.unique = true;
        let mut city = NewColumn::from(ColumnDefinition::new("city", "text"));
        city.index = true;

        connector.create_table("people", &[id, email, city]).await.unwrap();
        assert_eq!(
            driver.statements(),
            vec![
                "CREATE TABLE people (id serial NOT NULL, email varchar(80) NULL UNIQUE, \
                 city text NULL, PRIMARY KEY (id))",
                "CREATE INDEX \"people_city_idx\" ON people (city)",
            ]
        );
    }

    #[tokio::test]
    async fn test_edit_column_runs_each_change() {
        let (connector, driver) = connector_for("postgresql");
        let definition = ColumnDefinition::new("title", "varchar")
            .with_length("120")
            .with_default(DefaultValue::Literal("none".to_string()))
            .not_null();
        connector.edit_column("books", "name", &definition).await.unwrap();
        assert_eq!(
            driver.statements(),
            vec![
                "ALTER TABLE books RENAME COLUMN name TO title",
                "ALTER TABLE books ALTER COLUMN title TYPE varchar(120)",
                "ALTER TABLE books ALTER COLUMN title SET NOT NULL",
                "ALTER TABLE books ALTER COLUMN title SET DEFAULT 'none'",
            ]
        );

        let err = connector
            .edit_column("books", "title", &ColumnDefinition::new("title", "int4").auto_increment())
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn test_index_and_primary_key_forms() {
        let (connector, driver) = connector_for("postgresql");
        connector.add_index("t", "t_a", "a").await.unwrap();
        connector.add_unique_index("t", "tb", "b").await.unwrap();
        connector.drop_index("t", "tb").await.unwrap();
        connector.add_primary_key("t", "a").await.unwrap();

        driver.respond(
            "contype = 'p'",
            &["column_name", "constraint_name"],
            vec![vec![Some("a"), Some("t_pkey")], vec![Some("b"), Some("t_pkey")]],
        );
        connector.add_primary_key("t", "c").await.unwrap();
        connector.drop_primary_key("t", "a").await.unwrap();

        let statements = driver.statements();
        let ddl: Vec<&String> = statements.iter().filter(|s| !s.starts_with("SELECT")).collect();
        assert_eq!(
            ddl,
            vec![
                "CREATE INDEX \"t_a\" ON t (a)",
                "CREATE UNIQUE INDEX tb ON t (b)",
                "DROP INDEX tb",
                "ALTER TABLE t ADD PRIMARY KEY (a)",
                "ALTER TABLE t DROP CONSTRAINT \"t_pkey\", ADD PRIMARY KEY (a,b,c)",
                "ALTER TABLE t DROP CONSTRAINT \"t_pkey\", ADD PRIMARY KEY (b)",
            ]
        );
    }

    #[tokio::test]
    async fn test_drop_database_runs_from_template1() {
        let (connector, driver) = connector_for("postgresql");
        connector.get_tables().await.unwrap();

        connector.drop_database("sales").await.unwrap();
        assert_eq!(driver.last_url().as_deref(), Some("memory://db1:5000/template1"));
        assert_eq!(driver.last().unwrap().sql, "DROP DATABASE sales");
        assert_eq!(driver.closed(), 1);
    }

    #[tokio::test]
    async fn test_privileges_limited() {
        let (connector, _) = connector_for("postgresql");
        assert_eq!(connector.possible_privileges(), ["SELECT", "DELETE", "INSERT", "UPDATE"]);
        assert!(connector.grant_privileges("t", "bob", &["EXECUTE"]).await.is_err());
    }
}
