//! Services for dbdesk.
//!
//! This module contains the connection machinery:
//! - `driver` - Driver and DriverConnection traits
//! - `pool` - DatabasePool with per-target reuse and idle sweeping
//! - `postgres` - PostgreSQL driver (tokio-postgres)
//! - `mysql` - MySQL driver (sqlx)

pub mod driver;
pub mod mysql;
pub mod pool;
pub mod postgres;

pub use driver::{Driver, DriverConnection};
pub use mysql::MySqlDriver;
pub use pool::{DatabasePool, PooledConnection};
pub use postgres::PostgresDriver;
