//! Structured inputs for row writes and DDL.

use serde::{Deserialize, Serialize};

use crate::error::DeskError;
use crate::models::DefaultValue;

// ========== Row values ==========

/// One column of a row write.
///
/// When `function` is set, it replaces the bound value with a server-side
/// expression. Connectors only accept expressions from their allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnValue {
    /// Column name
    pub column: String,
    /// Function override such as `NOW()`
    pub function: Option<String>,
    /// Value bound as a parameter; `None` binds SQL NULL
    pub value: Option<String>,
}

impl ColumnValue {
    /// A bound value.
    pub fn value(column: impl Into<String>, value: Option<&str>) -> Self {
        Self { column: column.into(), function: None, value: value.map(String::from) }
    }

    /// A function override.
    pub fn function(column: impl Into<String>, function: impl Into<String>) -> Self {
        Self { column: column.into(), function: Some(function.into()), value: None }
    }

    /// Zip parallel arrays of names, optional function overrides and values.
    ///
    /// An empty function string counts as no override.
    pub fn from_parallel(
        columns: &[&str],
        functions: &[Option<&str>],
        values: &[Option<&str>],
    ) -> Result<Vec<Self>, DeskError> {
        if columns.len() != functions.len() || columns.len() != values.len() {
            return Err(DeskError::invalid_input(format!(
                "{} columns, {} functions and {} values do not line up",
                columns.len(),
                functions.len(),
                values.len()
            )));
        }
        Ok(columns
            .iter()
            .zip(functions)
            .zip(values)
            .map(|((column, function), value)| Self {
                column: column.to_string(),
                function: function.filter(|f| !f.trim().is_empty()).map(String::from),
                value: value.map(String::from),
            })
            .collect())
    }

    /// Whether a function override is present.
    pub fn has_function(&self) -> bool {
        self.function.is_some()
    }
}

/// Primary key column values identifying one row.
///
/// A `None` value matches rows where the key column is NULL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    /// Key column name
    pub column: String,
    /// Key value
    pub value: Option<String>,
}

impl KeyValue {
    /// Create a key value.
    pub fn new(column: impl Into<String>, value: Option<&str>) -> Self {
        Self { column: column.into(), value: value.map(String::from) }
    }

    /// Zip parallel arrays of key names and values.
    pub fn from_parallel(
        columns: &[&str],
        values: &[Option<&str>],
    ) -> Result<Vec<Self>, DeskError> {
        if columns.len() != values.len() {
            return Err(DeskError::invalid_input(format!(
                "{} key columns but {} key values",
                columns.len(),
                values.len()
            )));
        }
        Ok(columns.iter().zip(values).map(|(c, v)| Self::new(*c, *v)).collect())
    }
}

// ========== Column definitions ==========

/// Nullability clause of a column definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullClause {
    /// `NULL`
    #[default]
    Null,
    /// `NOT NULL`
    NotNull,
}

impl NullClause {
    /// SQL keyword form.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::NotNull => "NOT NULL",
        }
    }
}

/// Column attributes for ADD/ALTER COLUMN and CREATE TABLE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,
    /// SQL type (e.g. `VARCHAR`)
    pub sql_type: String,
    /// Length, precision or enum value list
    pub length: Option<String>,
    /// Default value
    pub default: Option<DefaultValue>,
    /// Nullability
    pub null: NullClause,
    /// Whether the column auto-increments
    pub auto_increment: bool,
}

impl ColumnDefinition {
    /// Create a nullable column without default.
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            length: None,
            default: None,
            null: NullClause::Null,
            auto_increment: false,
        }
    }

    /// Set the length.
    pub fn with_length(mut self, length: impl Into<String>) -> Self {
        self.length = Some(length.into());
        self
    }

    /// Set the default.
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Mark NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.null = NullClause::NotNull;
        self
    }

    /// Mark auto-increment.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }
}

/// A column of a new table with its key and index flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewColumn {
    /// Column attributes
    pub definition: ColumnDefinition,
    /// Part of the primary key
    pub primary_key: bool,
    /// Gets a plain index
    pub index: bool,
    /// Gets a unique index
    pub unique: bool,
}

impl From<ColumnDefinition> for NewColumn {
    fn from(definition: ColumnDefinition) -> Self {
        Self { definition, primary_key: false, index: false, unique: false }
    }
}

// ========== Constraints ==========

/// Referential action for ON DELETE / ON UPDATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferentialAction {
    /// `NO ACTION`
    #[default]
    NoAction,
    /// `RESTRICT`
    Restrict,
    /// `CASCADE`
    Cascade,
    /// `SET NULL`
    SetNull,
    /// `SET DEFAULT`
    SetDefault,
}

impl ReferentialAction {
    /// SQL keyword form.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

/// MATCH type of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// `MATCH FULL`
    Full,
    /// `MATCH PARTIAL`
    Partial,
    /// `MATCH SIMPLE`
    Simple,
}

impl MatchType {
    /// SQL keyword form.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Full => "FULL",
            Self::Partial => "PARTIAL",
            Self::Simple => "SIMPLE",
        }
    }
}

/// Behavior of DROP CONSTRAINT towards dependent objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropBehavior {
    /// `RESTRICT`
    #[default]
    Restrict,
    /// `CASCADE`
    Cascade,
}

impl DropBehavior {
    /// SQL keyword form.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
        }
    }
}

/// A foreign key to add to a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDefinition {
    /// Constraint name
    pub constraint: String,
    /// Referencing column on this table
    pub column: String,
    /// Referenced table
    pub references_table: String,
    /// Referenced column
    pub references_column: String,
    /// Optional MATCH type
    pub match_type: Option<MatchType>,
    /// ON DELETE action
    pub on_delete: ReferentialAction,
    /// ON UPDATE action
    pub on_update: ReferentialAction,
    /// Whether the constraint is deferrable
    pub deferrable: bool,
    /// Whether a deferrable constraint starts deferred
    pub initially_deferred: bool,
}

impl ForeignKeyDefinition {
    /// A non-deferrable foreign key with NO ACTION rules.
    pub fn new(
        constraint: impl Into<String>,
        column: impl Into<String>,
        references_table: impl Into<String>,
        references_column: impl Into<String>,
    ) -> Self {
        Self {
            constraint: constraint.into(),
            column: column.into(),
            references_table: references_table.into(),
            references_column: references_column.into(),
            match_type: None,
            on_delete: ReferentialAction::NoAction,
            on_update: ReferentialAction::NoAction,
            deferrable: false,
            initially_deferred: false,
        }
    }
}
