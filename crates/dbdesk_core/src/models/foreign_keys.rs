//! Foreign key relationships of a table.

use serde::{Deserialize, Serialize};

use crate::models::MetaBool;

/// One column pair of a foreign key constraint.
///
/// The foreign side holds the referencing column, the primary side the
/// referenced one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name
    pub constraint: String,
    /// Referencing table
    pub foreign_table: String,
    /// Referencing column
    pub foreign_column: String,
    /// Referenced table
    pub primary_table: String,
    /// Referenced column
    pub primary_column: String,
    /// ON UPDATE action, `None` when unknown
    pub update_rule: Option<String>,
    /// ON DELETE action, `None` when unknown
    pub delete_rule: Option<String>,
    /// MATCH option of the constraint (`FULL`, `PARTIAL`, `SIMPLE`), `None` when unknown
    pub match_option: Option<String>,
    /// Whether the constraint is deferrable
    pub deferrable: MetaBool,
    /// Whether the constraint starts deferred
    pub initially_deferred: MetaBool,
}

/// Imported or exported foreign keys of one table.
///
/// Imported keys are this table's references to other tables; exported keys
/// are other tables' references to this one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeys {
    entries: Vec<ForeignKey>,
}

impl ForeignKeys {
    /// Create from entries.
    pub fn new(entries: Vec<ForeignKey>) -> Self {
        Self { entries }
    }

    /// Wrap entries, treating an empty list as "no relationships".
    pub fn non_empty(entries: Vec<ForeignKey>) -> Option<Self> {
        if entries.is_empty() {
            None
        } else {
            Some(Self { entries })
        }
    }

    /// All entries.
    pub fn entries(&self) -> &[ForeignKey] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the entry whose referencing column is `column`.
    pub fn foreign_id(&self, column: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.foreign_column == column)
    }

    /// Indexes of all entries whose referenced column is `column`.
    pub fn foreign_ids(&self, column: &str) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.primary_column == column)
            .map(|(i, _)| i)
            .collect()
    }

    /// Index of the entry whose referenced column is `column`.
    pub fn primary_id(&self, column: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.primary_column == column)
    }

    /// Entry at `index`.
    pub fn get(&self, index: usize) -> Option<&ForeignKey> {
        self.entries.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fk(constraint: &str, foreign: (&str, &str), primary: (&str, &str)) -> ForeignKey {
        ForeignKey {
            constraint: constraint.to_string(),
            foreign_table: foreign.0.to_string(),
            foreign_column: foreign.1.to_string(),
            primary_table: primary.0.to_string(),
            primary_column: primary.1.to_string(),
            update_rule: Some("NO ACTION".to_string()),
            delete_rule: Some("CASCADE".to_string()),
            match_option: None,
            deferrable: MetaBool::False,
            initially_deferred: MetaBool::False,
        }
    }

    #[test]
    fn test_empty_is_absent() {
        assert!(ForeignKeys::non_empty(Vec::new()).is_none());
        assert!(ForeignKeys::non_empty(vec![fk("a", ("x", "y"), ("z", "w"))]).is_some());
    }

    #[test]
    fn test_lookups() {
        let keys = ForeignKeys::new(vec![
            fk("lines_order_fk", ("lines", "order_id"), ("orders", "id")),
            fk("notes_order_fk", ("notes", "order_ref"), ("orders", "id")),
            fk("lines_product_fk", ("lines", "product_id"), ("products", "id")),
        ]);

        assert_eq!(keys.foreign_id("product_id"), Some(2));
        assert_eq!(keys.foreign_id("id"), None);
        assert_eq!(keys.foreign_ids("id"), vec![0, 1, 2]);
        assert_eq!(keys.primary_id("id"), Some(0));
        assert_eq!(keys.get(1).map(|e| e.foreign_table.as_str()), Some("notes"));
    }
}
