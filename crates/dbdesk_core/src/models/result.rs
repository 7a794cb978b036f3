//! Statement result models.

use serde::{Deserialize, Serialize};

/// Rows returned by a statement, every value decoded to text.
///
/// Column names are only known when at least one row came back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Column names in result order
    pub columns: Vec<String>,
    /// Row values in column order; `None` is SQL NULL
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    /// Create a result set.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }

    /// Get the number of rows returned.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by name, ignoring ASCII case.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Value of `column` in row `row`.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)?.as_deref()
    }

    /// Iterate over rows with name-based access.
    pub fn iter(&self) -> impl Iterator<Item = RowRef<'_>> {
        self.rows.iter().map(move |values| RowRef { set: self, values })
    }

    /// First value of every row.
    pub fn first_column(&self) -> Vec<String> {
        self.rows.iter().filter_map(|r| r.first().cloned().flatten()).collect()
    }

    /// First value of the first row.
    pub fn scalar(&self) -> Option<&str> {
        self.rows.first()?.first()?.as_deref()
    }
}

/// Borrowed view of one row.
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    set: &'a ResultSet,
    values: &'a [Option<String>],
}

impl<'a> RowRef<'a> {
    /// Value of the named column.
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let index = self.set.column_index(column)?;
        self.values.get(index)?.as_deref()
    }

    /// Value of the named column, empty when NULL or missing.
    pub fn text(&self, column: &str) -> String {
        self.get(column).unwrap_or_default().to_string()
    }

    /// All values in column order.
    pub fn values(&self) -> &'a [Option<String>] {
        self.values
    }
}
