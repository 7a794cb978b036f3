//! Driver abstraction over backend client libraries.
//!
//! A [`Driver`] opens physical connections from a resolved connection URL.
//! Every [`DriverConnection`] speaks the same minimal protocol: text
//! parameters bound positionally to `?` placeholders and result values
//! decoded to text.

use async_trait::async_trait;

use crate::error::DeskError;
use crate::models::{ResultSet, TargetDescriptor};

/// Opens physical connections for one backend client library.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Registered name, referenced by the `driver` product property.
    fn name(&self) -> &str;

    /// Client library description shown to operators.
    fn description(&self) -> String;

    /// Open a new physical connection.
    ///
    /// The URL carries host, port and database; credentials come from the target.
    async fn connect(
        &self,
        url: &str,
        target: &TargetDescriptor,
    ) -> Result<Box<dyn DriverConnection>, DeskError>;
}

/// One open physical connection.
#[async_trait]
pub trait DriverConnection: Send {
    /// Run a statement that returns rows.
    async fn query(&mut self, sql: &str, params: &[Option<String>]) -> Result<ResultSet, DeskError>;

    /// Run a statement and return the number of affected rows.
    async fn execute(&mut self, sql: &str, params: &[Option<String>]) -> Result<u64, DeskError>;

    /// Server product and version string.
    async fn server_version(&mut self) -> Result<String, DeskError>;

    /// Whether the connection is known to be unusable.
    fn is_closed(&self) -> bool;

    /// Close the connection gracefully.
    async fn close(self: Box<Self>) -> Result<(), DeskError>;
}

/// Count `?` placeholders outside quoted regions.
pub fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    scan_placeholders(sql, |_| count += 1);
    count
}

/// Rewrite `?` placeholders outside quoted regions to `$1`, `$2`, ...
pub fn number_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0;
    let mut last = 0;
    scan_placeholders(sql, |at| {
        n += 1;
        out.push_str(&sql[last..at]);
        out.push('$');
        out.push_str(&n.to_string());
        last = at + 1;
    });
    out.push_str(&sql[last..]);
    out
}

/// Call `found` with the byte offset of every placeholder.
///
/// Single-quoted literals and double-quoted or backtick identifiers are
/// skipped. A doubled quote closes and reopens the region, which leaves the
/// scan state correct.
fn scan_placeholders(sql: &str, mut found: impl FnMut(usize)) {
    let mut quote: Option<char> = None;
    for (i, c) in sql.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '?' => found(i),
                _ => {}
            },
        }
    }
}
