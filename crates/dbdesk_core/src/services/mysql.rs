//! MySQL driver on sqlx.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::mysql::MySqlQueryResult;
use sqlx::{Column, Connection, Executor, Row, TypeInfo, ValueRef};

use crate::error::DeskError;
use crate::models::{ResultSet, TargetDescriptor};
use crate::services::driver::{Driver, DriverConnection};

/// Driver registered as `mysql`.
#[derive(Debug, Default, Clone)]
pub struct MySqlDriver;

impl MySqlDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for MySqlDriver {
    fn name(&self) -> &str {
        "mysql"
    }

    fn description(&self) -> String {
        "sqlx 0.8 (MySQL)".to_string()
    }

    async fn connect(
        &self,
        url: &str,
        target: &TargetDescriptor,
    ) -> Result<Box<dyn DriverConnection>, DeskError> {
        let options = MySqlConnectOptions::from_str(url)
            .map_err(|e| DeskError::config(format!("Invalid MySQL URL '{url}': {e}")))?
            .username(&target.username)
            .password(&target.password);

        let conn = MySqlConnection::connect_with(&options).await?;
        tracing::debug!(
            host = %target.host,
            database = %target.database,
            "MySQL connection opened"
        );

        Ok(Box::new(MySqlDriverConnection { conn, closed: false }))
    }
}

struct MySqlDriverConnection {
    conn: MySqlConnection,
    closed: bool,
}

impl MySqlDriverConnection {
    fn track(&mut self, err: sqlx::Error) -> DeskError {
        let err = DeskError::from(err);
        if err.is_connection_lost() {
            self.closed = true;
        }
        err
    }
}

#[async_trait]
impl DriverConnection for MySqlDriverConnection {
    async fn query(
        &mut self,
        sql: &str,
        params: &[Option<String>],
    ) -> Result<ResultSet, DeskError> {
        let fetched = fetch(&mut self.conn, sql, params).await;
        let rows = fetched.map_err(|e| self.track(e))?;

        let mut result = ResultSet::default();
        if let Some(first) = rows.first() {
            result.columns = first.columns().iter().map(|c| c.name().to_string()).collect();
        }
        for row in &rows {
            result.rows.push(decode_row(row)?);
        }
        Ok(result)
    }

    async fn execute(&mut self, sql: &str, params: &[Option<String>]) -> Result<u64, DeskError> {
        let done = run(&mut self.conn, sql, params).await;
        Ok(done.map_err(|e| self.track(e))?.rows_affected())
    }

    async fn server_version(&mut self) -> Result<String, DeskError> {
        let rows = self.query("SELECT VERSION()", &[]).await?;
        Ok(format!("MySQL {}", rows.scalar().unwrap_or_default()))
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(self: Box<Self>) -> Result<(), DeskError> {
        self.conn.close().await?;
        Ok(())
    }
}

// Statements without parameters go over the text protocol, which accepts
// commands the server refuses to prepare.
async fn fetch(
    conn: &mut MySqlConnection,
    sql: &str,
    params: &[Option<String>],
) -> Result<Vec<MySqlRow>, sqlx::Error> {
    if params.is_empty() {
        return conn.fetch_all(sqlx::raw_sql(sql)).await;
    }
    let mut query = sqlx::query(sql);
    for param in params {
        query = query.bind(param.clone());
    }
    conn.fetch_all(query).await
}

async fn run(
    conn: &mut MySqlConnection,
    sql: &str,
    params: &[Option<String>],
) -> Result<MySqlQueryResult, sqlx::Error> {
    if params.is_empty() {
        return conn.execute(sqlx::raw_sql(sql)).await;
    }
    let mut query = sqlx::query(sql);
    for param in params {
        query = query.bind(param.clone());
    }
    conn.execute(query).await
}

fn decode_row(row: &MySqlRow) -> Result<Vec<Option<String>>, DeskError> {
    let mut values = Vec::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        let is_null = row.try_get_raw(i)?.is_null();
        if is_null {
            values.push(None);
            continue;
        }
        let type_name = column.type_info().name();
        let value = match decode_value(row, i, type_name) {
            Ok(v) => v,
            // Zero dates and out-of-range times fail typed decoding.
            Err(_) => bytes_to_text(row.try_get_unchecked::<Vec<u8>, _>(i)?),
        };
        values.push(Some(value));
    }
    Ok(values)
}

fn decode_value(row: &MySqlRow, i: usize, type_name: &str) -> Result<String, sqlx::Error> {
    let text = match ValueKind::of(type_name) {
        ValueKind::Signed => row.try_get_unchecked::<i64, _>(i)?.to_string(),
        ValueKind::Unsigned => row.try_get_unchecked::<u64, _>(i)?.to_string(),
        ValueKind::Float => row.try_get_unchecked::<f32, _>(i)?.to_string(),
        ValueKind::Double => row.try_get_unchecked::<f64, _>(i)?.to_string(),
        ValueKind::Date => row.try_get_unchecked::<chrono::NaiveDate, _>(i)?.to_string(),
        ValueKind::DateTime => row.try_get_unchecked::<chrono::NaiveDateTime, _>(i)?.to_string(),
        ValueKind::Time => row.try_get_unchecked::<chrono::NaiveTime, _>(i)?.to_string(),
        ValueKind::Bytes => bytes_to_text(row.try_get_unchecked::<Vec<u8>, _>(i)?),
        ValueKind::Text => row.try_get_unchecked::<String, _>(i)?,
    };
    Ok(text)
}

/// How a MySQL column type is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Signed,
    Unsigned,
    Float,
    Double,
    Date,
    DateTime,
    Time,
    Bytes,
    Text,
}

impl ValueKind {
    fn of(type_name: &str) -> Self {
        let upper = type_name.to_ascii_uppercase();
        let base = upper.split_whitespace().next().unwrap_or_default();
        match base {
            "BOOLEAN" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT"
            | "YEAR" => {
                if upper.ends_with("UNSIGNED") {
                    Self::Unsigned
                } else {
                    Self::Signed
                }
            }
            "FLOAT" => Self::Float,
            "DOUBLE" | "REAL" => Self::Double,
            "DATE" => Self::Date,
            "DATETIME" | "TIMESTAMP" => Self::DateTime,
            "TIME" => Self::Time,
            "BIT" | "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB"
            | "GEOMETRY" => Self::Bytes,
            _ => Self::Text,
        }
    }
}

/// Binary values as UTF-8 when valid, otherwise `0x`-prefixed hex.
fn bytes_to_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let mut out = String::from("0x");
            for b in e.as_bytes() {
                out.push_str(&format!("{b:02X}"));
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_kind() {
        assert_eq!(ValueKind::of("INT"), ValueKind::Signed);
        assert_eq!(ValueKind::of("BIGINT UNSIGNED"), ValueKind::Unsigned);
        assert_eq!(ValueKind::of("BOOLEAN"), ValueKind::Signed);
        assert_eq!(ValueKind::of("DOUBLE"), ValueKind::Double);
        assert_eq!(ValueKind::of("TIMESTAMP"), ValueKind::DateTime);
        assert_eq!(ValueKind::of("LONGBLOB"), ValueKind::Bytes);
        assert_eq!(ValueKind::of("DECIMAL"), ValueKind::Text);
        assert_eq!(ValueKind::of("ENUM"), ValueKind::Text);
        assert_eq!(ValueKind::of("varchar"), ValueKind::Text);
    }

    #[test]
    fn test_bytes_to_text() {
        assert_eq!(bytes_to_text(b"abc".to_vec()), "abc");
        assert_eq!(bytes_to_text(vec![0xff, 0x01]), "0xFF01");
    }

    #[test]
    fn test_driver_identity() {
        let driver = MySqlDriver::new();
        assert_eq!(driver.name(), "mysql");
        assert!(driver.description().contains("sqlx"));
    }
}
