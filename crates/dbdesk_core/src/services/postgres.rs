//! PostgreSQL driver on tokio-postgres.
//!
//! Parameters are sent as `text` and every result value is decoded from the
//! binary wire format back into its textual form.

use std::error::Error;
use std::fmt::Write as _;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{pin_mut, TryStreamExt};
use tokio_postgres::types::{FromSql, Kind, Type};
use tokio_postgres::{Client, NoTls};

use crate::error::DeskError;
use crate::models::{ResultSet, TargetDescriptor};
use crate::services::driver::{number_placeholders, Driver, DriverConnection};

type DecodeError = Box<dyn Error + Sync + Send>;

/// Driver registered as `postgres`.
#[derive(Debug, Default, Clone)]
pub struct PostgresDriver;

impl PostgresDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for PostgresDriver {
    fn name(&self) -> &str {
        "postgres"
    }

    fn description(&self) -> String {
        "tokio-postgres 0.7".to_string()
    }

    async fn connect(
        &self,
        url: &str,
        target: &TargetDescriptor,
    ) -> Result<Box<dyn DriverConnection>, DeskError> {
        let mut pg_config = tokio_postgres::Config::from_str(url)
            .map_err(|e| DeskError::config(format!("Invalid PostgreSQL URL '{url}': {e}")))?;
        pg_config.user(&target.username);
        if !target.password.is_empty() {
            pg_config.password(&target.password);
        }
        pg_config.application_name("dbdesk");
        pg_config.connect_timeout(Duration::from_secs(30));

        let (client, connection) = pg_config.connect(NoTls).await?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "PostgreSQL connection task ended with error");
            }
        });

        tracing::debug!(
            host = %target.host,
            database = %target.database,
            "PostgreSQL connection opened"
        );

        Ok(Box::new(PostgresConnection { client }))
    }
}

struct PostgresConnection {
    client: Client,
}

impl PostgresConnection {
    async fn run(
        &self,
        sql: &str,
        params: &[Option<String>],
    ) -> Result<(ResultSet, u64), DeskError> {
        let sql = number_placeholders(sql);
        let stream = self
            .client
            .query_typed_raw(&sql, params.iter().map(|p| (p, Type::TEXT)))
            .await?;
        pin_mut!(stream);

        let mut result = ResultSet::default();
        while let Some(row) = stream.try_next().await? {
            if result.columns.is_empty() {
                result.columns = row.columns().iter().map(|c| c.name().to_string()).collect();
            }
            let mut values = Vec::with_capacity(row.len());
            for i in 0..row.len() {
                let PgText(value) = row.try_get::<_, PgText>(i)?;
                values.push(value);
            }
            result.rows.push(values);
        }
        let affected = stream.rows_affected().unwrap_or(0);
        Ok((result, affected))
    }
}

#[async_trait]
impl DriverConnection for PostgresConnection {
    async fn query(
        &mut self,
        sql: &str,
        params: &[Option<String>],
    ) -> Result<ResultSet, DeskError> {
        self.run(sql, params).await.map(|(rows, _)| rows)
    }

    async fn execute(&mut self, sql: &str, params: &[Option<String>]) -> Result<u64, DeskError> {
        self.run(sql, params).await.map(|(_, affected)| affected)
    }

    async fn server_version(&mut self) -> Result<String, DeskError> {
        let rows = self.query("SELECT version()", &[]).await?;
        Ok(rows.scalar().unwrap_or_default().to_string())
    }

    fn is_closed(&self) -> bool {
        self.client.is_closed()
    }

    async fn close(self: Box<Self>) -> Result<(), DeskError> {
        // Dropping the client ends the connection task.
        drop(self.client);
        Ok(())
    }
}

/// Any column value rendered as text.
struct PgText(Option<String>);

impl<'a> FromSql<'a> for PgText {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, DecodeError> {
        decode_value(ty, raw).map(|v| PgText(Some(v)))
    }

    fn from_sql_null(_: &Type) -> Result<Self, DecodeError> {
        Ok(PgText(None))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

fn decode_value(ty: &Type, raw: &[u8]) -> Result<String, DecodeError> {
    let text = match *ty {
        Type::BOOL => bool::from_sql(ty, raw)?.to_string(),
        Type::INT2 => i16::from_sql(ty, raw)?.to_string(),
        Type::INT4 => i32::from_sql(ty, raw)?.to_string(),
        Type::INT8 => i64::from_sql(ty, raw)?.to_string(),
        Type::OID => u32::from_sql(ty, raw)?.to_string(),
        Type::FLOAT4 => f32::from_sql(ty, raw)?.to_string(),
        Type::FLOAT8 => f64::from_sql(ty, raw)?.to_string(),
        Type::CHAR => (i8::from_sql(ty, raw)? as u8 as char).to_string(),
        Type::NUMERIC => decode_numeric(raw)?,
        Type::DATE => chrono::NaiveDate::from_sql(ty, raw)?.to_string(),
        Type::TIME => chrono::NaiveTime::from_sql(ty, raw)?.to_string(),
        Type::TIMESTAMP => chrono::NaiveDateTime::from_sql(ty, raw)?.to_string(),
        Type::TIMESTAMPTZ => chrono::DateTime::<chrono::Utc>::from_sql(ty, raw)?.to_rfc3339(),
        Type::UUID => uuid::Uuid::from_sql(ty, raw)?.to_string(),
        Type::JSON | Type::JSONB => serde_json::Value::from_sql(ty, raw)?.to_string(),
        Type::BYTEA => format!("\\x{}", hex(raw)),
        _ if <String as FromSql>::accepts(ty) => String::from_sql(ty, raw)?,
        _ if matches!(ty.kind(), Kind::Enum(_)) => std::str::from_utf8(raw)?.to_string(),
        _ => match std::str::from_utf8(raw) {
            Ok(s) => s.to_string(),
            Err(_) => format!("\\x{}", hex(raw)),
        },
    };
    Ok(text)
}

fn hex(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len() * 2);
    for b in raw {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Render a binary `numeric` value, keeping its display scale.
fn decode_numeric(raw: &[u8]) -> Result<String, DecodeError> {
    if raw.len() < 8 {
        return Err("numeric value too short".into());
    }
    let read = |at: usize| i16::from_be_bytes([raw[at], raw[at + 1]]);
    let ndigits = usize::try_from(read(0)).map_err(|_| "negative numeric digit count")?;
    let weight = read(2) as i32;
    let sign = read(4) as u16;
    let dscale = read(6) as u16 as usize;

    match sign {
        0xC000 => return Ok("NaN".to_string()),
        0xD000 => return Ok("Infinity".to_string()),
        0xF000 => return Ok("-Infinity".to_string()),
        _ => {}
    }
    if raw.len() < 8 + ndigits * 2 {
        return Err("numeric value truncated".into());
    }
    let digits: Vec<i16> = (0..ndigits).map(|i| read(8 + i * 2)).collect();
    let digit = |i: i32| if i < 0 { 0 } else { digits.get(i as usize).copied().unwrap_or(0) };

    let mut out = String::new();
    if sign == 0x4000 {
        out.push('-');
    }
    if weight < 0 || ndigits == 0 {
        out.push('0');
    } else {
        for i in 0..=weight {
            if i == 0 {
                let _ = write!(out, "{}", digit(i));
            } else {
                let _ = write!(out, "{:04}", digit(i));
            }
        }
    }
    if dscale > 0 {
        let mut frac = String::with_capacity(dscale + 4);
        let mut i = weight + 1;
        while frac.len() < dscale {
            let _ = write!(frac, "{:04}", digit(i));
            i += 1;
        }
        frac.truncate(dscale);
        out.push('.');
        out.push_str(&frac);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(weight: i16, sign: u16, dscale: u16, digits: &[i16]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&(digits.len() as i16).to_be_bytes());
        raw.extend_from_slice(&weight.to_be_bytes());
        raw.extend_from_slice(&sign.to_be_bytes());
        raw.extend_from_slice(&dscale.to_be_bytes());
        for d in digits {
            raw.extend_from_slice(&d.to_be_bytes());
        }
        raw
    }

    #[test]
    fn test_decode_numeric() {
        assert_eq!(decode_numeric(&numeric(0, 0, 1, &[12, 5000])).unwrap(), "12.5");
        assert_eq!(decode_numeric(&numeric(-1, 0, 2, &[500])).unwrap(), "0.05");
        assert_eq!(decode_numeric(&numeric(-2, 0, 5, &[5000])).unwrap(), "0.00005");
        assert_eq!(decode_numeric(&numeric(1, 0, 0, &[1])).unwrap(), "10000");
        assert_eq!(decode_numeric(&numeric(1, 0x4000, 2, &[1, 2345, 6700])).unwrap(), "-12345.67");
        assert_eq!(decode_numeric(&numeric(0, 0, 0, &[])).unwrap(), "0");
        assert_eq!(decode_numeric(&numeric(0, 0xC000, 0, &[])).unwrap(), "NaN");
    }

    #[test]
    fn test_decode_numeric_rejects_truncated() {
        assert!(decode_numeric(&[0, 1]).is_err());
        let mut raw = numeric(0, 0, 0, &[1, 2]);
        raw.truncate(raw.len() - 1);
        assert!(decode_numeric(&raw).is_err());
    }

    #[test]
    fn test_decode_scalars() {
        assert_eq!(decode_value(&Type::INT4, &42i32.to_be_bytes()).unwrap(), "42");
        assert_eq!(decode_value(&Type::INT8, &(-7i64).to_be_bytes()).unwrap(), "-7");
        assert_eq!(decode_value(&Type::BOOL, &[1]).unwrap(), "true");
        assert_eq!(decode_value(&Type::CHAR, &[b'c']).unwrap(), "c");
        assert_eq!(decode_value(&Type::FLOAT8, &1.5f64.to_be_bytes()).unwrap(), "1.5");
        assert_eq!(decode_value(&Type::TEXT, b"hello").unwrap(), "hello");
        assert_eq!(decode_value(&Type::NAME, b"orders").unwrap(), "orders");
        assert_eq!(decode_value(&Type::BYTEA, &[0xde, 0xad]).unwrap(), "\\xdead");
    }

    #[test]
    fn test_decode_date() {
        // 2000-01-02: one day after the PostgreSQL epoch
        assert_eq!(decode_value(&Type::DATE, &1i32.to_be_bytes()).unwrap(), "2000-01-02");
    }

    #[test]
    fn test_null_and_accepts() {
        assert!(<PgText as FromSql>::accepts(&Type::INT2_VECTOR));
        let PgText(v) = PgText::from_sql_null(&Type::INT4).unwrap();
        assert!(v.is_none());
    }
}
