//! Schema introspection records.
//!
//! Every record is built fresh from one introspection call and handed to the
//! caller; nothing here is cached. Records are stored as parallel sequences
//! whose lengths are checked on construction.

use serde::{Deserialize, Serialize};

use crate::error::DeskError;
use crate::models::MetaBool;

fn check_lengths(record: &str, lengths: &[usize]) -> Result<(), DeskError> {
    if lengths.windows(2).all(|w| w[0] == w[1]) {
        Ok(())
    } else {
        Err(DeskError::invalid_input(format!(
            "{record} sequences must all have the same length, got {lengths:?}"
        )))
    }
}

// ========== Default values ==========

/// Column default: either a literal value or a server-side expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum DefaultValue {
    /// A literal that is escaped when written into SQL
    Literal(String),
    /// A function expression written into SQL as-is (e.g. `now()`)
    Function(String),
}

impl DefaultValue {
    /// Parse the `V`/`F` tagged form (`"V0"`, `"Fnow()"`).
    ///
    /// Returns `None` for an absent, empty or untagged value.
    pub fn parse_tagged(tagged: &str) -> Option<Self> {
        let mut chars = tagged.chars();
        match chars.next() {
            Some('V') => Some(Self::Literal(chars.as_str().to_string())),
            Some('F') if !chars.as_str().is_empty() => {
                Some(Self::Function(chars.as_str().to_string()))
            }
            _ => None,
        }
    }

    /// Encode in the `V`/`F` tagged form.
    pub fn to_tagged(&self) -> String {
        match self {
            Self::Literal(value) => format!("V{value}"),
            Self::Function(expr) => format!("F{expr}"),
        }
    }

    /// The literal or expression text without its tag.
    pub fn text(&self) -> &str {
        match self {
            Self::Literal(value) | Self::Function(value) => value,
        }
    }

    /// Whether this default is a function expression.
    pub fn is_function(&self) -> bool {
        matches!(self, Self::Function(_))
    }
}

// ========== Columns ==========

/// Column metadata of one table, in the backend's native column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Columns {
    names: Vec<String>,
    types: Vec<String>,
    lengths: Vec<Option<String>>,
    nullable: Vec<MetaBool>,
    defaults: Vec<Option<DefaultValue>>,
    remarks: Vec<Option<String>>,
}

impl Columns {
    /// Create from parallel sequences.
    pub fn new(
        names: Vec<String>,
        types: Vec<String>,
        lengths: Vec<Option<String>>,
        nullable: Vec<MetaBool>,
        defaults: Vec<Option<DefaultValue>>,
        remarks: Vec<Option<String>>,
    ) -> Result<Self, DeskError> {
        check_lengths(
            "Columns",
            &[
                names.len(),
                types.len(),
                lengths.len(),
                nullable.len(),
                defaults.len(),
                remarks.len(),
            ],
        )?;
        Ok(Self { names, types, lengths, nullable, defaults, remarks })
    }

    /// Append one column.
    pub(crate) fn push(
        &mut self,
        name: impl Into<String>,
        sql_type: impl Into<String>,
        length: Option<String>,
        nullable: MetaBool,
        default: Option<DefaultValue>,
        remark: Option<String>,
    ) {
        self.names.push(name.into());
        self.types.push(sql_type.into());
        self.lengths.push(length);
        self.nullable.push(nullable);
        self.defaults.push(default);
        self.remarks.push(remark);
    }

    /// Get the index of a column by name.
    pub fn get_id(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table has no columns.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Column names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// SQL type names.
    pub fn types(&self) -> &[String] {
        &self.types
    }

    /// Length or precision; for enum/set columns the rendered `'a','b'` value list.
    pub fn lengths(&self) -> &[Option<String>] {
        &self.lengths
    }

    /// Nullability.
    pub fn nullable(&self) -> &[MetaBool] {
        &self.nullable
    }

    /// Default values.
    pub fn defaults(&self) -> &[Option<DefaultValue>] {
        &self.defaults
    }

    /// Remarks (MySQL reports `auto_increment` here).
    pub fn remarks(&self) -> &[Option<String>] {
        &self.remarks
    }

    /// Type of the named column.
    pub fn get_type(&self, name: &str) -> Option<&str> {
        self.get_id(name).map(|i| self.types[i].as_str())
    }

    /// Default of the named column.
    pub fn get_default(&self, name: &str) -> Option<&DefaultValue> {
        self.get_id(name).and_then(|i| self.defaults[i].as_ref())
    }

    /// Remark of the named column.
    pub fn get_remark(&self, name: &str) -> Option<&str> {
        self.get_id(name).and_then(|i| self.remarks[i].as_deref())
    }

    /// Nullability of the named column.
    pub fn get_nullable(&self, name: &str) -> MetaBool {
        self.get_id(name).map(|i| self.nullable[i]).unwrap_or(MetaBool::Unknown)
    }
}

// ========== Indexes ==========

/// Index membership, one entry per (index, column) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Indexes {
    names: Vec<String>,
    unique: Vec<MetaBool>,
    columns: Vec<String>,
}

impl Indexes {
    /// Create from parallel sequences.
    pub fn new(
        names: Vec<String>,
        unique: Vec<MetaBool>,
        columns: Vec<String>,
    ) -> Result<Self, DeskError> {
        check_lengths("Indexes", &[names.len(), unique.len(), columns.len()])?;
        Ok(Self { names, unique, columns })
    }

    /// Append one (index, column) pair.
    pub(crate) fn push(
        &mut self,
        name: impl Into<String>,
        unique: MetaBool,
        column: impl Into<String>,
    ) {
        self.names.push(name.into());
        self.unique.push(unique);
        self.columns.push(column.into());
    }

    /// Index names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Uniqueness, normalized so `True` always means unique.
    pub fn unique(&self) -> &[MetaBool] {
        &self.unique
    }

    /// Indexed column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Distinct index names covering the given column.
    pub fn indexes_on(&self, column: &str) -> Vec<&str> {
        let mut found: Vec<&str> = Vec::new();
        for (name, col) in self.names.iter().zip(&self.columns) {
            if col == column && !found.contains(&name.as_str()) {
                found.push(name);
            }
        }
        found
    }
}

// ========== Primary keys ==========

/// Primary key columns and the constraint each belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrimaryKeys {
    columns: Vec<String>,
    names: Vec<String>,
}

impl PrimaryKeys {
    /// Create from parallel sequences.
    pub fn new(columns: Vec<String>, names: Vec<String>) -> Result<Self, DeskError> {
        check_lengths("PrimaryKeys", &[columns.len(), names.len()])?;
        Ok(Self { columns, names })
    }

    /// Append one key column.
    pub(crate) fn push(&mut self, column: impl Into<String>, name: impl Into<String>) {
        self.columns.push(column.into());
        self.names.push(name.into());
    }

    /// Key column names in key order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Constraint names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Whether the column is part of the primary key.
    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Name of the primary key constraint, if any.
    pub fn constraint_name(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }

    /// Number of key columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the table has no primary key.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

// ========== Check constraints ==========

/// Named CHECK constraints and their clauses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckConstraints {
    names: Vec<String>,
    clauses: Vec<String>,
}

impl CheckConstraints {
    /// Create from parallel sequences.
    pub fn new(names: Vec<String>, clauses: Vec<String>) -> Result<Self, DeskError> {
        check_lengths("CheckConstraints", &[names.len(), clauses.len()])?;
        Ok(Self { names, clauses })
    }

    /// Append one constraint.
    pub(crate) fn push(&mut self, name: impl Into<String>, clause: impl Into<String>) {
        self.names.push(name.into());
        self.clauses.push(clause.into());
    }

    /// Constraint names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Check clause text.
    pub fn clauses(&self) -> &[String] {
        &self.clauses
    }

    /// Number of constraints.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether there are no constraints.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// ========== Table privileges ==========

/// Privileges granted on one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TablePrivileges {
    grantors: Vec<Option<String>>,
    grantees: Vec<String>,
    privileges: Vec<String>,
    grantable: Vec<MetaBool>,
}

impl TablePrivileges {
    /// Create from parallel sequences.
    pub fn new(
        grantors: Vec<Option<String>>,
        grantees: Vec<String>,
        privileges: Vec<String>,
        grantable: Vec<MetaBool>,
    ) -> Result<Self, DeskError> {
        check_lengths(
            "TablePrivileges",
            &[grantors.len(), grantees.len(), privileges.len(), grantable.len()],
        )?;
        Ok(Self { grantors, grantees, privileges, grantable })
    }

    /// Append one grant.
    pub(crate) fn push(
        &mut self,
        grantor: Option<String>,
        grantee: impl Into<String>,
        privilege: impl Into<String>,
        grantable: MetaBool,
    ) {
        self.grantors.push(grantor);
        self.grantees.push(grantee.into());
        self.privileges.push(privilege.into());
        self.grantable.push(grantable);
    }

    /// Grantors; `None` where the backend does not record them.
    pub fn grantors(&self) -> &[Option<String>] {
        &self.grantors
    }

    /// Grantees.
    pub fn grantees(&self) -> &[String] {
        &self.grantees
    }

    /// Privilege names.
    pub fn privileges(&self) -> &[String] {
        &self.privileges
    }

    /// Whether the grantee may pass the privilege on.
    pub fn grantable(&self) -> &[MetaBool] {
        &self.grantable
    }

    /// Number of grants.
    pub fn len(&self) -> usize {
        self.grantees.len()
    }

    /// Whether there are no grants.
    pub fn is_empty(&self) -> bool {
        self.grantees.is_empty()
    }
}

// ========== Schema graph ==========

/// A column reference target in the schema graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaReference {
    /// Referenced table
    pub table: String,
    /// Referenced column
    pub column: String,
}

/// A column of a table in the schema graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRow {
    /// Column name
    pub name: String,
    /// Columns this one references through foreign keys
    pub references: Vec<SchemaReference>,
}

/// One table of the database schema graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaTable {
    /// Table name
    pub name: String,
    /// Columns in table order
    pub rows: Vec<SchemaRow>,
}

impl SchemaTable {
    /// Create an empty table node.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), rows: Vec::new() }
    }

    /// Get the row for a column, creating it at the end if missing.
    pub(crate) fn row_mut(&mut self, column: &str) -> &mut SchemaRow {
        let index = match self.rows.iter().position(|r| r.name == column) {
            Some(index) => index,
            None => {
                self.rows.push(SchemaRow { name: column.to_string(), references: Vec::new() });
                self.rows.len() - 1
            }
        };
        &mut self.rows[index]
    }

    /// Record that `column` references `table.referenced`.
    pub(crate) fn add_reference(
        &mut self,
        column: &str,
        table: impl Into<String>,
        referenced: impl Into<String>,
    ) {
        self.row_mut(column)
            .references
            .push(SchemaReference { table: table.into(), column: referenced.into() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_value_tagged_round_trip() {
        assert_eq!(DefaultValue::parse_tagged("V0"), Some(DefaultValue::Literal("0".to_string())));
        assert_eq!(
            DefaultValue::parse_tagged("Fnow()"),
            Some(DefaultValue::Function("now()".to_string()))
        );
        assert_eq!(DefaultValue::parse_tagged("V"), Some(DefaultValue::Literal(String::new())));
        assert_eq!(DefaultValue::parse_tagged("F"), None);
        assert_eq!(DefaultValue::parse_tagged(""), None);
        assert_eq!(DefaultValue::parse_tagged("x1"), None);
        assert_eq!(DefaultValue::Function("now()".to_string()).to_tagged(), "Fnow()");
    }

    #[test]
    fn test_columns_rejects_mismatched_lengths() {
        let err = Columns::new(
            vec!["id".to_string(), "name".to_string()],
            vec!["int".to_string()],
            vec![None, None],
            vec![MetaBool::False, MetaBool::True],
            vec![None, None],
            vec![None, None],
        )
        .unwrap_err();
        assert!(matches!(err, DeskError::InvalidInput { .. }));
    }

    #[test]
    fn test_columns_get_id() {
        let mut columns = Columns::default();
        columns.push("id", "int4", None, MetaBool::False, None, None);
        columns.push(
            "created",
            "timestamp",
            None,
            MetaBool::True,
            Some(DefaultValue::Function("now()".to_string())),
            None,
        );

        assert_eq!(columns.get_id("id"), Some(0));
        assert_eq!(columns.get_id("created"), Some(1));
        assert_eq!(columns.get_id("missing"), None);
        assert_eq!(columns.get_type("created"), Some("timestamp"));
        assert!(columns.get_default("created").unwrap().is_function());
        assert_eq!(columns.get_nullable("missing"), MetaBool::Unknown);
        assert_eq!(columns.len(), 2);
        assert_eq!(columns.remarks().len(), columns.names().len());
    }

    #[test]
    fn test_indexes_on_column_is_distinct() {
        let mut indexes = Indexes::default();
        indexes.push("orders_pkey", MetaBool::True, "id");
        indexes.push("orders_cust_idx", MetaBool::False, "customer");
        indexes.push("orders_cust_idx", MetaBool::False, "customer");
        indexes.push("orders_multi", MetaBool::False, "id");

        assert_eq!(indexes.indexes_on("id"), vec!["orders_pkey", "orders_multi"]);
        assert_eq!(indexes.indexes_on("customer"), vec!["orders_cust_idx"]);
    }

    #[test]
    fn test_primary_keys_constraint_name() {
        let mut keys = PrimaryKeys::default();
        assert_eq!(keys.constraint_name(), None);
        keys.push("order_id", "line_pkey");
        keys.push("line_no", "line_pkey");
        assert!(keys.contains("line_no"));
        assert_eq!(keys.constraint_name(), Some("line_pkey"));
        assert!(PrimaryKeys::new(vec!["a".to_string()], vec![]).is_err());
    }

    #[test]
    fn test_schema_table_rows_keep_column_order() {
        let mut table = SchemaTable::new("orders");
        table.row_mut("id");
        table.row_mut("customer_id");
        table.add_reference("customer_id", "customers", "id");
        table.add_reference("id", "audit", "order_id");

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].name, "id");
        assert_eq!(table.rows[1].references[0].table, "customers");
    }
}
