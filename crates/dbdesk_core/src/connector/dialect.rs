//! SQL dialect hooks: identifier quoting, literal escaping and clause syntax.

use crate::models::DefaultValue;

/// Function overrides accepted by every backend.
pub const STANDARD_FUNCTIONS: &[&str] =
    &["NOW()", "CURRENT_TIMESTAMP", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_USER"];

/// Privileges offered by the generic and MySQL connectors.
pub const STANDARD_PRIVILEGES: &[&str] =
    &["SELECT", "DELETE", "INSERT", "UPDATE", "REFERENCES", "EXECUTE"];

/// Quote `identifier` with `quote` unless it is a plain lowercase name.
///
/// Plain names match `[a-z][a-z0-9]*`. Embedded quote characters are doubled.
pub fn quote_with(identifier: &str, quote: char) -> String {
    if is_plain_identifier(identifier) {
        return identifier.to_string();
    }
    let mut quoted = String::with_capacity(identifier.len() + 2);
    quoted.push(quote);
    for ch in identifier.chars() {
        if ch == quote {
            quoted.push(quote);
        }
        quoted.push(ch);
    }
    quoted.push(quote);
    quoted
}

/// Whether `identifier` matches `[a-z][a-z0-9]*`.
pub fn is_plain_identifier(identifier: &str) -> bool {
    let mut chars = identifier.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {
            chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        }
        _ => false,
    }
}

/// Single-quoted standard SQL literal with embedded quotes doubled.
pub fn standard_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Syntax differences between backends.
///
/// Every hook has the standard SQL behavior as its default.
pub trait Dialect: Send + Sync {
    /// Quote a table name.
    fn quote_table(&self, name: &str) -> String {
        quote_with(name, '"')
    }

    /// Quote a column name.
    fn quote_column(&self, name: &str) -> String {
        quote_with(name, '"')
    }

    /// Quote a type name used in a cast.
    fn quote_type(&self, name: &str) -> String {
        name.to_string()
    }

    /// Render `value` as a quoted string literal.
    fn escape_literal(&self, value: &str) -> String {
        standard_literal(value)
    }

    /// Predicate matching NULL in `column`.
    fn null_test(&self, column: &str) -> String {
        format!("ISNULL({})", self.quote_column(column))
    }

    /// Row window appended to a browse query; `None` when unsupported.
    fn limit_clause(&self, _start: u64, _count: u64) -> Option<String> {
        None
    }

    /// Function overrides accepted in row writes.
    fn allowed_functions(&self) -> &'static [&'static str] {
        STANDARD_FUNCTIONS
    }

    /// Privileges that may be granted or revoked.
    fn possible_privileges(&self) -> &'static [&'static str] {
        STANDARD_PRIVILEGES
    }

    /// Column attribute enabling auto increment; `None` when unsupported.
    fn auto_increment(&self) -> Option<&'static str> {
        Some("AUTO_INCREMENT")
    }

    /// Render the grantee of a GRANT or REVOKE.
    fn grantee(&self, user: &str) -> String {
        self.quote_column(user)
    }

    /// Render a DEFAULT value.
    fn default_value(&self, default: &DefaultValue) -> String {
        match default {
            DefaultValue::Literal(value) => self.escape_literal(value),
            DefaultValue::Function(expr) => expr.clone(),
        }
    }
}

/// Standard SQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericDialect;

impl Dialect for GenericDialect {}

/// MySQL dialect: backtick quoting, backslash escapes and `LIMIT start,count`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn quote_table(&self, name: &str) -> String {
        quote_with(name, '`')
    }

    fn quote_column(&self, name: &str) -> String {
        quote_with(name, '`')
    }

    fn escape_literal(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('\'');
        for ch in value.chars() {
            match ch {
                '\'' => out.push_str("''"),
                '\\' => out.push_str("\\\\"),
                '\0' => out.push_str("\\0"),
                _ => out.push(ch),
            }
        }
        out.push('\'');
        out
    }

    fn limit_clause(&self, start: u64, count: u64) -> Option<String> {
        Some(format!("LIMIT {start},{count}"))
    }

    /// `'user'@'host'`, with host `%` when the user names none.
    fn grantee(&self, user: &str) -> String {
        let (name, host) = user.rsplit_once('@').unwrap_or((user, "%"));
        format!("{}@{}", self.escape_literal(name), self.escape_literal(host))
    }
}

/// PostgreSQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

/// Privileges offered by the PostgreSQL connector.
pub const POSTGRES_PRIVILEGES: &[&str] = &["SELECT", "DELETE", "INSERT", "UPDATE"];

impl Dialect for PostgresDialect {
    fn quote_type(&self, name: &str) -> String {
        // Multi-word and parameterized types are already valid SQL.
        if name.contains([' ', '(', '[']) {
            name.to_string()
        } else {
            quote_with(name, '"')
        }
    }

    fn null_test(&self, column: &str) -> String {
        format!("{} IS NULL", self.quote_column(column))
    }

    fn limit_clause(&self, start: u64, count: u64) -> Option<String> {
        Some(format!("LIMIT {count} OFFSET {start}"))
    }

    fn possible_privileges(&self) -> &'static [&'static str] {
        POSTGRES_PRIVILEGES
    }

    fn auto_increment(&self) -> Option<&'static str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_identifiers_are_unchanged() {
        for name in ["orders", "id", "a1", "x2y3"] {
            assert_eq!(GenericDialect.quote_column(name), name);
            assert_eq!(MySqlDialect.quote_table(name), name);
        }
    }

    #[test]
    fn test_other_identifiers_are_quoted() {
        assert_eq!(GenericDialect.quote_table("Orders"), "\"Orders\"");
        assert_eq!(GenericDialect.quote_column("1st"), "\"1st\"");
        assert_eq!(GenericDialect.quote_column("order_id"), "\"order_id\"");
        assert_eq!(GenericDialect.quote_column("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(GenericDialect.quote_column(""), "\"\"");
        assert_eq!(MySqlDialect.quote_column("My`Col"), "`My``Col`");
    }

    #[test]
    fn test_literal_escaping() {
        assert_eq!(GenericDialect.escape_literal("it's"), "'it''s'");
        assert_eq!(GenericDialect.escape_literal("a\\b"), "'a\\b'");
        assert_eq!(MySqlDialect.escape_literal("it's a\\b"), "'it''s a\\\\b'");
    }

    #[test]
    fn test_null_tests() {
        assert_eq!(GenericDialect.null_test("id"), "ISNULL(id)");
        assert_eq!(MySqlDialect.null_test("Id"), "ISNULL(`Id`)");
        assert_eq!(PostgresDialect.null_test("id"), "id IS NULL");
    }

    #[test]
    fn test_limit_clauses() {
        assert_eq!(GenericDialect.limit_clause(10, 5), None);
        assert_eq!(MySqlDialect.limit_clause(10, 5).as_deref(), Some("LIMIT 10,5"));
        assert_eq!(PostgresDialect.limit_clause(10, 5).as_deref(), Some("LIMIT 5 OFFSET 10"));
    }

    #[test]
    fn test_postgres_type_quoting() {
        assert_eq!(PostgresDialect.quote_type("int4"), "int4");
        assert_eq!(PostgresDialect.quote_type("MyEnum"), "\"MyEnum\"");
        assert_eq!(
            PostgresDialect.quote_type("timestamp without time zone"),
            "timestamp without time zone"
        );
        assert_eq!(PostgresDialect.quote_type("character varying(20)"), "character varying(20)");
    }

    #[test]
    fn test_grantees() {
        assert_eq!(GenericDialect.grantee("alice"), "alice");
        assert_eq!(PostgresDialect.grantee("Bob"), "\"Bob\"");
        assert_eq!(MySqlDialect.grantee("carol@localhost"), "'carol'@'localhost'");
        assert_eq!(MySqlDialect.grantee("dave"), "'dave'@'%'");
    }

    #[test]
    fn test_default_value_rendering() {
        assert_eq!(GenericDialect.default_value(&DefaultValue::Literal("x'y".into())), "'x''y'");
        assert_eq!(GenericDialect.default_value(&DefaultValue::Function("now()".into())), "now()");
    }
}
