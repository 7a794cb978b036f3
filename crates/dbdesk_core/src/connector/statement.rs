//! Statement builder for row writes and DDL.
//!
//! Every statement is assembled completely before a connection is acquired.
//! Values travel as bound `?` parameters; only allow-listed function
//! overrides and checked type fragments are spliced into the SQL text.

use std::collections::HashMap;

use crate::connector::dialect::Dialect;
use crate::error::DeskError;
use crate::models::{
    ColumnDefinition, ColumnValue, DefaultValue, ForeignKeyDefinition, KeyValue, NewColumn,
};

/// SQL text plus its bound parameters in placeholder order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Option<String>>,
}

impl Statement {
    /// A statement without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into(), params: Vec::new() }
    }
}

/// Placeholder syntax per column.
///
/// Plain placeholders are `?`. Columns with a registered cast type get
/// `?::type`, which PostgreSQL needs for text parameters.
#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    casts: HashMap<String, String>,
}

impl Placeholders {
    /// Bare `?` for every column.
    pub fn plain() -> Self {
        Self::default()
    }

    /// `?::type` for every column in `casts`.
    pub fn with_casts(casts: HashMap<String, String>) -> Self {
        Self { casts }
    }

    /// Placeholder for `column`.
    pub fn marker(&self, dialect: &dyn Dialect, column: &str) -> String {
        match self.casts.get(column) {
            Some(cast) => format!("?::{}", dialect.quote_type(cast)),
            None => "?".to_string(),
        }
    }
}

/// Reject text that could end or comment out the statement it is spliced into.
///
/// Delimiters inside quoted literals and identifiers are allowed; a doubled
/// quote character is an escaped quote. An unterminated quote is rejected.
pub fn check_fragment(what: &str, text: &str) -> Result<(), DeskError> {
    let delimited = || {
        DeskError::invalid_input(format!("{what} '{text}' contains statement delimiters"))
    };
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\'' | '"' | '`' => loop {
                match chars.next() {
                    Some(c) if c == ch => {
                        if chars.peek() == Some(&ch) {
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    Some(_) => {}
                    None => return Err(delimited()),
                }
            },
            ';' => return Err(delimited()),
            '-' if chars.peek() == Some(&'-') => return Err(delimited()),
            '/' if chars.peek() == Some(&'*') => return Err(delimited()),
            _ => {}
        }
    }
    Ok(())
}

/// Resolve a function override against the dialect's allow-list.
pub fn resolve_function(dialect: &dyn Dialect, function: &str) -> Result<&'static str, DeskError> {
    let wanted = function.trim();
    dialect
        .allowed_functions()
        .iter()
        .find(|f| f.eq_ignore_ascii_case(wanted))
        .copied()
        .ok_or_else(|| DeskError::invalid_input(format!("Function '{wanted}' is not allowed")))
}

fn value_expression(
    dialect: &dyn Dialect,
    value: &ColumnValue,
    placeholders: &Placeholders,
    params: &mut Vec<Option<String>>,
) -> Result<String, DeskError> {
    match &value.function {
        Some(function) => Ok(resolve_function(dialect, function)?.to_string()),
        None => {
            params.push(value.value.clone());
            Ok(placeholders.marker(dialect, &value.column))
        }
    }
}

fn key_predicates(
    dialect: &dyn Dialect,
    keys: &[KeyValue],
    placeholders: &Placeholders,
    params: &mut Vec<Option<String>>,
) -> Result<String, DeskError> {
    if keys.is_empty() {
        return Err(DeskError::invalid_input("At least one primary key column is required"));
    }
    let predicates: Vec<String> = keys
        .iter()
        .map(|key| match &key.value {
            None => dialect.null_test(&key.column),
            Some(value) => {
                params.push(Some(value.clone()));
                format!(
                    "{}={}",
                    dialect.quote_column(&key.column),
                    placeholders.marker(dialect, &key.column)
                )
            }
        })
        .collect();
    Ok(predicates.join(" AND "))
}

/// `INSERT INTO t (a,b) VALUES (?,?)`.
pub fn insert_row(
    dialect: &dyn Dialect,
    table: &str,
    values: &[ColumnValue],
    placeholders: &Placeholders,
) -> Result<Statement, DeskError> {
    if values.is_empty() {
        return Err(DeskError::invalid_input("No columns to insert"));
    }
    let mut params = Vec::with_capacity(values.len());
    let columns: Vec<String> = values.iter().map(|v| dialect.quote_column(&v.column)).collect();
    let exprs = values
        .iter()
        .map(|v| value_expression(dialect, v, placeholders, &mut params))
        .collect::<Result<Vec<_>, _>>()?;

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        dialect.quote_table(table),
        columns.join(","),
        exprs.join(",")
    );
    Ok(Statement { sql, params })
}

/// `UPDATE t SET a=?,b=? WHERE k=?`.
pub fn update_row(
    dialect: &dyn Dialect,
    table: &str,
    values: &[ColumnValue],
    keys: &[KeyValue],
    placeholders: &Placeholders,
) -> Result<Statement, DeskError> {
    if values.is_empty() {
        return Err(DeskError::invalid_input("No columns to update"));
    }
    let mut params = Vec::with_capacity(values.len() + keys.len());
    let mut assignments = Vec::with_capacity(values.len());
    for value in values {
        let expr = value_expression(dialect, value, placeholders, &mut params)?;
        assignments.push(format!("{}={}", dialect.quote_column(&value.column), expr));
    }
    let predicates = key_predicates(dialect, keys, placeholders, &mut params)?;

    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        dialect.quote_table(table),
        assignments.join(","),
        predicates
    );
    Ok(Statement { sql, params })
}

/// `DELETE FROM t WHERE k=?`.
pub fn delete_row(
    dialect: &dyn Dialect,
    table: &str,
    keys: &[KeyValue],
    placeholders: &Placeholders,
) -> Result<Statement, DeskError> {
    let mut params = Vec::with_capacity(keys.len());
    let predicates = key_predicates(dialect, keys, placeholders, &mut params)?;
    let sql = format!("DELETE FROM {} WHERE {}", dialect.quote_table(table), predicates);
    Ok(Statement { sql, params })
}

/// `SELECT * FROM t WHERE k=?`.
pub fn select_row(
    dialect: &dyn Dialect,
    table: &str,
    keys: &[KeyValue],
    placeholders: &Placeholders,
) -> Result<Statement, DeskError> {
    let mut params = Vec::with_capacity(keys.len());
    let predicates = key_predicates(dialect, keys, placeholders, &mut params)?;
    let sql = format!("SELECT * FROM {} WHERE {}", dialect.quote_table(table), predicates);
    Ok(Statement { sql, params })
}

/// Browse query with optional filter, ordering and row window.
///
/// `where_clause` is trusted SQL, normally built by [`select_where_clause`].
pub fn select_rows(
    dialect: &dyn Dialect,
    table: &str,
    where_clause: Option<&str>,
    order_by: Option<&str>,
    window: Option<(u64, u64)>,
) -> String {
    let mut sql = format!("SELECT * FROM {}", dialect.quote_table(table));
    if let Some(clause) = where_clause.filter(|c| !c.trim().is_empty()) {
        sql.push_str(" WHERE ");
        sql.push_str(clause);
    }
    if let Some(column) = order_by.filter(|c| !c.is_empty()) {
        sql.push_str(" ORDER BY ");
        sql.push_str(&dialect.quote_column(column));
    }
    if let Some(limit) = window.and_then(|(start, count)| dialect.limit_clause(start, count)) {
        sql.push(' ');
        sql.push_str(&limit);
    }
    sql
}

/// Search filter: `LIKE` with an escaped literal per non-empty value, a null
/// test per `None` value. Returns `None` when nothing is filtered.
pub fn select_where_clause(dialect: &dyn Dialect, criteria: &[KeyValue]) -> Option<String> {
    let predicates: Vec<String> = criteria
        .iter()
        .filter(|c| !c.column.is_empty())
        .filter_map(|c| match c.value.as_deref() {
            None => Some(dialect.null_test(&c.column)),
            Some("") => None,
            Some(value) => Some(format!(
                "{} LIKE {}",
                dialect.quote_column(&c.column),
                dialect.escape_literal(value)
            )),
        })
        .collect();
    if predicates.is_empty() {
        None
    } else {
        Some(predicates.join(" AND "))
    }
}

/// Type with its length or value set, e.g. `VARCHAR(20)`.
///
/// Text types never take a length.
pub fn type_clause(sql_type: &str, length: Option<&str>) -> Result<String, DeskError> {
    let sql_type = sql_type.trim();
    if sql_type.is_empty() {
        return Err(DeskError::invalid_input("Column type is required"));
    }
    check_fragment("Type", sql_type)?;
    match length.map(str::trim).filter(|l| !l.is_empty()) {
        Some(length) if !sql_type.to_ascii_uppercase().ends_with("TEXT") => {
            check_fragment("Length", length)?;
            Ok(format!("{sql_type}({length})"))
        }
        _ => Ok(sql_type.to_string()),
    }
}

/// Render a DEFAULT value, checking function expressions.
pub fn default_clause(dialect: &dyn Dialect, default: &DefaultValue) -> Result<String, DeskError> {
    if let DefaultValue::Function(expr) = default {
        check_fragment("Default expression", expr)?;
    }
    Ok(dialect.default_value(default))
}

/// Column definition: `name type(len) [DEFAULT x] NULL|NOT NULL [AUTO_INCREMENT]`.
pub fn column_definition(
    dialect: &dyn Dialect,
    column: &ColumnDefinition,
) -> Result<String, DeskError> {
    let mut sql = format!(
        "{} {}",
        dialect.quote_column(&column.name),
        type_clause(&column.sql_type, column.length.as_deref())?
    );
    if let Some(default) = &column.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(&default_clause(dialect, default)?);
    }
    sql.push(' ');
    sql.push_str(column.null.as_sql());
    if column.auto_increment {
        let keyword = dialect.auto_increment().ok_or_else(|| {
            DeskError::unsupported("Auto increment columns are not supported; use a serial type")
        })?;
        sql.push(' ');
        sql.push_str(keyword);
    }
    Ok(sql)
}

/// `CREATE TABLE` with inline primary key, index and unique clauses.
pub fn create_table(
    dialect: &dyn Dialect,
    table: &str,
    columns: &[NewColumn],
) -> Result<String, DeskError> {
    if columns.is_empty() {
        return Err(DeskError::invalid_input("A table needs at least one column"));
    }
    let mut parts = Vec::with_capacity(columns.len() + 2);
    for column in columns {
        parts.push(column_definition(dialect, &column.definition)?);
    }
    let primary: Vec<String> = columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| dialect.quote_column(&c.definition.name))
        .collect();
    if !primary.is_empty() {
        parts.push(format!("PRIMARY KEY ({})", primary.join(",")));
    }
    for column in columns {
        let name = dialect.quote_column(&column.definition.name);
        if column.index {
            parts.push(format!("INDEX ({name})"));
        }
        if column.unique {
            parts.push(format!("UNIQUE ({name})"));
        }
    }
    Ok(format!("CREATE TABLE {} ({})", dialect.quote_table(table), parts.join(", ")))
}

/// `ALTER TABLE t ADD CONSTRAINT c FOREIGN KEY ...`.
///
/// The DEFERRABLE clause is only written when the backend understands it.
pub fn add_foreign_key(
    dialect: &dyn Dialect,
    table: &str,
    key: &ForeignKeyDefinition,
    with_deferrable: bool,
) -> Result<String, DeskError> {
    if key.initially_deferred && !key.deferrable {
        return Err(DeskError::invalid_input(
            "Only a deferrable constraint can be initially deferred",
        ));
    }
    let mut sql = format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        dialect.quote_table(table),
        dialect.quote_column(&key.constraint),
        dialect.quote_column(&key.column),
        dialect.quote_table(&key.references_table),
        dialect.quote_column(&key.references_column),
    );
    if let Some(match_type) = key.match_type {
        sql.push_str(" MATCH ");
        sql.push_str(match_type.as_sql());
    }
    sql.push_str(" ON DELETE ");
    sql.push_str(key.on_delete.as_sql());
    sql.push_str(" ON UPDATE ");
    sql.push_str(key.on_update.as_sql());
    if with_deferrable {
        if key.deferrable {
            sql.push_str(" DEFERRABLE INITIALLY ");
            sql.push_str(if key.initially_deferred { "DEFERRED" } else { "IMMEDIATE" });
        } else {
            sql.push_str(" NOT DEFERRABLE");
        }
    }
    Ok(sql)
}

/// Comma-separated privilege list, each checked against the dialect.
pub fn privilege_list(dialect: &dyn Dialect, privileges: &[&str]) -> Result<String, DeskError> {
    if privileges.is_empty() {
        return Err(DeskError::invalid_input("No privileges specified"));
    }
    let allowed = dialect.possible_privileges();
    let checked = privileges
        .iter()
        .map(|p| {
            allowed
                .iter()
                .find(|a| a.eq_ignore_ascii_case(p.trim()))
                .copied()
                .ok_or_else(|| DeskError::invalid_input(format!("Unknown privilege '{p}'")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(checked.join(","))
}
