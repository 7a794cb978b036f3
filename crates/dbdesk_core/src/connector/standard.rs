//! Standard behavior shared by every connector.
//!
//! The provided methods of [`Connector`] delegate here. Catalog reads use
//! `information_schema`; DDL uses the statement forms the generic connector
//! has always written.

use std::io::Write;

use crate::connector::statement::{self, check_fragment, Statement};
use crate::connector::Connector;
use crate::error::DeskError;
use crate::models::{
    ColumnDefinition, ColumnValue, Columns, DefaultValue, DropBehavior, ForeignKey,
    ForeignKeyDefinition, ForeignKeys, Indexes, KeyValue, MetaBool, NewColumn, NullClause,
    PrimaryKeys, ResultSet, SchemaTable, TablePrivileges,
};

/// Types offered for new columns by the generic connector.
pub const STANDARD_TYPES: &[&str] = &[
    "CHAR",
    "VARCHAR",
    "TEXT",
    "SMALLINT",
    "INTEGER",
    "BIGINT",
    "DECIMAL",
    "NUMERIC",
    "REAL",
    "DOUBLE PRECISION",
    "BOOLEAN",
    "DATE",
    "TIME",
    "TIMESTAMP",
    "BLOB",
];

/// Remark marking an auto increment column.
pub const AUTO_INCREMENT_REMARK: &str = "auto_increment";

/// Restrict a catalog query to the connected database; binds the database twice.
fn scope(alias: &str) -> String {
    format!(
        "({alias}table_catalog = ? OR {alias}table_schema = ?) \
         AND {alias}table_schema NOT IN ('information_schema', 'pg_catalog')"
    )
}

fn database_params<C: Connector + ?Sized>(connector: &C) -> [Option<String>; 2] {
    let database = connector.context().target().database.clone();
    [Some(database.clone()), Some(database)]
}

fn table_params<C: Connector + ?Sized>(connector: &C, table: &str) -> Vec<Option<String>> {
    let mut params = vec![Some(table.to_string())];
    params.extend(database_params(connector));
    params
}

async fn run_ddl<C: Connector + ?Sized>(connector: &C, sql: String) -> Result<(), DeskError> {
    connector.context().run(&Statement::new(sql)).await?;
    Ok(())
}

// ========== Descriptions ==========

/// Enum and set columns are edited as free text.
pub fn effective_type(sql_type: &str) -> String {
    let lower = sql_type.trim().to_ascii_lowercase();
    if lower.starts_with("enum") || lower.starts_with("set") {
        "text".to_string()
    } else {
        sql_type.to_string()
    }
}

/// Map catalog rule codes to their SQL wording.
///
/// Understands `pg_constraint` action letters and the numeric codes of the
/// standard metadata API; anything else is returned unchanged.
pub fn rule_description(rule: &str) -> String {
    let text = match rule.trim() {
        "a" | "3" => "NO ACTION",
        "r" | "1" => "RESTRICT",
        "c" | "0" => "CASCADE",
        "n" | "2" => "SET NULL",
        "d" | "4" => "SET DEFAULT",
        "5" => "INITIALLY DEFERRED",
        "6" => "INITIALLY IMMEDIATE",
        "7" => "NOT DEFERRABLE",
        other => return other.to_string(),
    };
    text.to_string()
}

pub fn driver_name<C: Connector + ?Sized>(connector: &C) -> Result<String, DeskError> {
    let product = connector.context().product();
    connector
        .context()
        .pool()
        .driver(&product.driver)
        .map(|driver| driver.description())
        .ok_or_else(|| DeskError::config(format!("No driver registered as '{}'", product.driver)))
}

pub async fn database_product_name<C: Connector + ?Sized>(
    connector: &C,
) -> Result<String, DeskError> {
    let mut conn = connector.context().acquire().await?;
    conn.server_version().await
}

// ========== Catalog ==========

pub async fn get_tables<C: Connector + ?Sized>(connector: &C) -> Result<Vec<String>, DeskError> {
    let sql = format!(
        "SELECT table_name FROM information_schema.tables WHERE {} ORDER BY table_name",
        scope("")
    );
    connector.context().list(&sql, &database_params(connector)).await
}

pub async fn get_databases<C: Connector + ?Sized>(connector: &C) -> Result<Vec<String>, DeskError> {
    connector
        .context()
        .list(
            "SELECT DISTINCT table_catalog FROM information_schema.tables ORDER BY table_catalog",
            &[],
        )
        .await
}

pub async fn get_columns<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
) -> Result<Columns, DeskError> {
    let sql = format!(
        "SELECT column_name, data_type, character_maximum_length, numeric_precision, \
         is_nullable, column_default \
         FROM information_schema.columns WHERE table_name = ? AND {} ORDER BY ordinal_position",
        scope("")
    );
    let rows = connector.context().query(&sql, &table_params(connector, table)).await?;

    let mut columns = Columns::default();
    for row in rows.iter() {
        let length = row
            .get("character_maximum_length")
            .or_else(|| row.get("numeric_precision"))
            .map(String::from);
        columns.push(
            row.text("column_name"),
            row.text("data_type"),
            length,
            MetaBool::parse(row.get("is_nullable")),
            row.get("column_default").map(|d| DefaultValue::Literal(d.to_string())),
            None,
        );
    }
    Ok(columns)
}

/// Key constraints of `table` with their columns in key order.
async fn key_constraints<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
    types: &str,
) -> Result<ResultSet, DeskError> {
    let sql = format!(
        "SELECT tc.constraint_name, tc.constraint_type, kcu.column_name \
         FROM information_schema.table_constraints tc \
         JOIN information_schema.key_column_usage kcu \
         ON kcu.constraint_name = tc.constraint_name \
         AND kcu.table_schema = tc.table_schema AND kcu.table_name = tc.table_name \
         WHERE tc.table_name = ? AND {} AND tc.constraint_type IN ({types}) \
         ORDER BY tc.constraint_name, kcu.ordinal_position",
        scope("tc.")
    );
    connector.context().query(&sql, &table_params(connector, table)).await
}

/// Unique and primary key constraints; plain indexes are not in the standard catalog.
pub async fn get_indexes<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
) -> Result<Indexes, DeskError> {
    let rows = key_constraints(connector, table, "'PRIMARY KEY', 'UNIQUE'").await?;
    let mut indexes = Indexes::default();
    for row in rows.iter() {
        indexes.push(row.text("constraint_name"), MetaBool::True, row.text("column_name"));
    }
    Ok(indexes)
}

pub async fn get_primary_keys<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
) -> Result<PrimaryKeys, DeskError> {
    let rows = key_constraints(connector, table, "'PRIMARY KEY'").await?;
    let mut keys = PrimaryKeys::default();
    for row in rows.iter() {
        keys.push(row.text("column_name"), row.text("constraint_name"));
    }
    Ok(keys)
}

/// Imported keys filter on the referencing table, exported keys on the referenced one.
pub async fn get_foreign_keys<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
    imported: bool,
) -> Result<Option<ForeignKeys>, DeskError> {
    let side = if imported { "fk" } else { "pk" };
    let sql = format!(
        "SELECT rc.constraint_name, \
         fk.table_name AS foreign_table, fk.column_name AS foreign_column, \
         pk.table_name AS primary_table, pk.column_name AS primary_column, \
         rc.update_rule, rc.delete_rule, rc.match_option, \
         tc.is_deferrable, tc.initially_deferred \
         FROM information_schema.referential_constraints rc \
         JOIN information_schema.key_column_usage fk \
         ON fk.constraint_schema = rc.constraint_schema \
         AND fk.constraint_name = rc.constraint_name \
         JOIN information_schema.key_column_usage pk \
         ON pk.constraint_schema = rc.unique_constraint_schema \
         AND pk.constraint_name = rc.unique_constraint_name \
         AND pk.ordinal_position = fk.position_in_unique_constraint \
         JOIN information_schema.table_constraints tc \
         ON tc.constraint_schema = rc.constraint_schema \
         AND tc.constraint_name = rc.constraint_name \
         WHERE {side}.table_name = ? AND {} \
         ORDER BY pk.table_name, rc.constraint_name, fk.ordinal_position",
        scope(&format!("{side}."))
    );
    let rows = connector.context().query(&sql, &table_params(connector, table)).await?;

    let entries = rows
        .iter()
        .map(|row| ForeignKey {
            constraint: row.text("constraint_name"),
            foreign_table: row.text("foreign_table"),
            foreign_column: row.text("foreign_column"),
            primary_table: row.text("primary_table"),
            primary_column: row.text("primary_column"),
            update_rule: row.get("update_rule").map(|r| connector.get_rule_description(r)),
            delete_rule: row.get("delete_rule").map(|r| connector.get_rule_description(r)),
            match_option: row.get("match_option").map(String::from),
            deferrable: MetaBool::parse(row.get("is_deferrable")),
            initially_deferred: MetaBool::parse(row.get("initially_deferred")),
        })
        .collect();
    Ok(ForeignKeys::non_empty(entries))
}

pub async fn get_table_privileges<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
) -> Result<TablePrivileges, DeskError> {
    let sql = format!(
        "SELECT grantor, grantee, privilege_type, is_grantable \
         FROM information_schema.table_privileges WHERE table_name = ? AND {} \
         ORDER BY grantee, privilege_type",
        scope("")
    );
    let rows = connector.context().query(&sql, &table_params(connector, table)).await?;
    let mut privileges = TablePrivileges::default();
    for row in rows.iter() {
        privileges.push(
            row.get("grantor").map(String::from),
            row.text("grantee"),
            row.text("privilege_type"),
            MetaBool::parse(row.get("is_grantable")),
        );
    }
    Ok(privileges)
}

pub async fn get_database_schema<C: Connector + ?Sized>(
    connector: &C,
) -> Result<Vec<SchemaTable>, DeskError> {
    let tables = connector.get_tables().await?;
    let mut schema = Vec::with_capacity(tables.len());
    for name in tables {
        let mut table = SchemaTable::new(&name);
        for column in connector.get_columns(&name).await?.names() {
            table.row_mut(column);
        }
        if connector.supports_foreign_keys() {
            if let Some(keys) = connector.get_imported_keys(&name).await? {
                for key in keys.entries() {
                    table.add_reference(
                        &key.foreign_column,
                        &key.primary_table,
                        &key.primary_column,
                    );
                }
            }
        }
        schema.push(table);
    }
    Ok(schema)
}

pub async fn count_records<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
) -> Result<u64, DeskError> {
    let sql = format!("SELECT COUNT(*) FROM {}", connector.quote_table(table));
    connector.context().count(&sql, &[]).await
}

// ========== Rows ==========

pub async fn insert_row<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
    values: &[ColumnValue],
) -> Result<u64, DeskError> {
    let placeholders = connector.placeholders(table).await?;
    let stmt = statement::insert_row(connector.dialect(), table, values, &placeholders)?;
    connector.context().run(&stmt).await
}

pub async fn edit_row<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
    values: &[ColumnValue],
    keys: &[KeyValue],
) -> Result<u64, DeskError> {
    let placeholders = connector.placeholders(table).await?;
    let stmt = statement::update_row(connector.dialect(), table, values, keys, &placeholders)?;
    connector.context().run(&stmt).await
}

pub async fn delete_row<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
    keys: &[KeyValue],
) -> Result<u64, DeskError> {
    let placeholders = connector.placeholders(table).await?;
    let stmt = statement::delete_row(connector.dialect(), table, keys, &placeholders)?;
    connector.context().run(&stmt).await
}

pub async fn get_row<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
    keys: &[KeyValue],
) -> Result<Vec<Option<String>>, DeskError> {
    let placeholders = connector.placeholders(table).await?;
    let stmt = statement::select_row(connector.dialect(), table, keys, &placeholders)?;
    let rows = connector.context().fetch(&stmt).await?;
    Ok(rows.rows.into_iter().next().unwrap_or_default())
}

/// Backends without a limit clause return the whole table, windowed here.
pub async fn get_rows<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
    where_clause: Option<&str>,
    order_by: Option<&str>,
    start: u64,
    count: u64,
) -> Result<ResultSet, DeskError> {
    let limited = connector.get_limit_clause(start, count).is_some();
    let sql = statement::select_rows(
        connector.dialect(),
        table,
        where_clause,
        order_by,
        Some((start, count)),
    );
    let mut rows = connector.context().query(&sql, &[]).await?;
    if !limited {
        let skip = usize::try_from(start).unwrap_or(usize::MAX);
        let take = usize::try_from(count).unwrap_or(usize::MAX);
        rows.rows = rows.rows.into_iter().skip(skip).take(take).collect();
    }
    Ok(rows)
}

pub async fn empty_table<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
) -> Result<u64, DeskError> {
    let sql = format!("DELETE FROM {}", connector.quote_table(table));
    connector.context().execute(&sql, &[]).await
}

pub async fn dump_table_contents<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
    out: &mut (dyn Write + Send),
) -> Result<(), DeskError> {
    let quoted = connector.quote_table(table);
    let rows = connector.context().query(&format!("SELECT * FROM {quoted}"), &[]).await?;
    let dialect = connector.dialect();
    for row in &rows.rows {
        let values: Vec<String> = row
            .iter()
            .map(|value| match value {
                Some(text) => dialect.escape_literal(text),
                None => "NULL".to_string(),
            })
            .collect();
        writeln!(out, "INSERT INTO {quoted} VALUES ({});", values.join(","))?;
    }
    out.flush()?;
    Ok(())
}

/// Column definitions of `table` as read back from the catalog.
pub async fn table_definition<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
) -> Result<Vec<NewColumn>, DeskError> {
    let columns = connector.get_columns(table).await?;
    let keys = connector.get_primary_keys(table).await?;
    let auto_increment = connector.dialect().auto_increment().is_some();

    let mut definition = Vec::with_capacity(columns.len());
    for (i, name) in columns.names().iter().enumerate() {
        let column = ColumnDefinition {
            name: name.clone(),
            sql_type: columns.types()[i].clone(),
            length: columns.lengths()[i].clone(),
            default: columns.defaults()[i].clone(),
            null: if columns.nullable()[i].is_false() {
                NullClause::NotNull
            } else {
                NullClause::Null
            },
            auto_increment: auto_increment
                && columns.remarks()[i].as_deref() == Some(AUTO_INCREMENT_REMARK),
        };
        let mut new_column = NewColumn::from(column);
        new_column.primary_key = keys.contains(name);
        definition.push(new_column);
    }
    Ok(definition)
}

pub async fn dump_table_structure<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
    out: &mut (dyn Write + Send),
) -> Result<(), DeskError> {
    let definition = table_definition(connector, table).await?;
    let sql = statement::create_table(connector.dialect(), table, &definition)?;
    writeln!(out, "{sql};")?;
    out.flush()?;
    Ok(())
}

// ========== DDL ==========

pub async fn create_table<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
    columns: &[NewColumn],
) -> Result<(), DeskError> {
    let sql = statement::create_table(connector.dialect(), table, columns)?;
    run_ddl(connector, sql).await
}

pub async fn add_column<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
    column: &ColumnDefinition,
) -> Result<(), DeskError> {
    let sql = format!(
        "ALTER TABLE {} ADD {}",
        connector.quote_table(table),
        statement::column_definition(connector.dialect(), column)?
    );
    run_ddl(connector, sql).await
}

pub async fn edit_column<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
    column: &str,
    definition: &ColumnDefinition,
) -> Result<(), DeskError> {
    let sql = format!(
        "ALTER TABLE {} CHANGE {} {}",
        connector.quote_table(table),
        connector.quote_column(column),
        statement::column_definition(connector.dialect(), definition)?
    );
    run_ddl(connector, sql).await
}

pub async fn delete_column<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
    column: &str,
) -> Result<(), DeskError> {
    let sql = format!(
        "ALTER TABLE {} DROP {}",
        connector.quote_table(table),
        connector.quote_column(column)
    );
    run_ddl(connector, sql).await
}

pub async fn add_index<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
    index: &str,
    column: &str,
    unique: bool,
) -> Result<(), DeskError> {
    let sql = format!(
        "ALTER TABLE {} ADD {} {} ({})",
        connector.quote_table(table),
        if unique { "UNIQUE" } else { "INDEX" },
        connector.quote_column(index),
        connector.quote_column(column)
    );
    run_ddl(connector, sql).await
}

fn key_list<C: Connector + ?Sized>(connector: &C, columns: &[String]) -> String {
    columns.iter().map(|c| connector.quote_column(c)).collect::<Vec<_>>().join(",")
}

pub async fn add_primary_key<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
    column: &str,
) -> Result<(), DeskError> {
    let keys = connector.get_primary_keys(table).await?;
    if keys.contains(column) {
        return Err(DeskError::invalid_input(format!(
            "{column} is already part of the primary key"
        )));
    }
    let mut columns = keys.columns().to_vec();
    columns.push(column.to_string());

    let drop = if keys.is_empty() { "" } else { "DROP PRIMARY KEY, " };
    let sql = format!(
        "ALTER TABLE {} {drop}ADD PRIMARY KEY ({})",
        connector.quote_table(table),
        key_list(connector, &columns)
    );
    run_ddl(connector, sql).await
}

pub async fn drop_primary_key<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
    column: &str,
) -> Result<(), DeskError> {
    let keys = connector.get_primary_keys(table).await?;
    if !keys.contains(column) {
        return Err(DeskError::invalid_input(format!("{column} is not part of the primary key")));
    }
    let remaining: Vec<String> = keys.columns().iter().filter(|c| *c != column).cloned().collect();

    let quoted = connector.quote_table(table);
    let sql = if remaining.is_empty() {
        format!("ALTER TABLE {quoted} DROP PRIMARY KEY")
    } else {
        format!(
            "ALTER TABLE {quoted} DROP PRIMARY KEY, ADD PRIMARY KEY ({})",
            key_list(connector, &remaining)
        )
    };
    run_ddl(connector, sql).await
}

pub async fn add_foreign_key<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
    key: &ForeignKeyDefinition,
    with_deferrable: bool,
) -> Result<(), DeskError> {
    if !connector.supports_foreign_keys() {
        return Err(DeskError::unsupported(format!(
            "The {} connector has no foreign keys",
            connector.kind()
        )));
    }
    let sql = statement::add_foreign_key(connector.dialect(), table, key, with_deferrable)?;
    run_ddl(connector, sql).await
}

pub async fn add_check_constraint<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
    constraint: &str,
    clause: &str,
) -> Result<(), DeskError> {
    if !connector.supports_check_constraints() {
        return Err(DeskError::unsupported(format!(
            "The {} connector has no check constraints",
            connector.kind()
        )));
    }
    check_fragment("Check clause", clause)?;
    let sql = format!(
        "ALTER TABLE {} ADD CONSTRAINT {} CHECK ({clause})",
        connector.quote_table(table),
        connector.quote_column(constraint)
    );
    run_ddl(connector, sql).await
}

pub async fn drop_constraint<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
    constraint: &str,
    behavior: DropBehavior,
) -> Result<(), DeskError> {
    let sql = format!(
        "ALTER TABLE {} DROP CONSTRAINT {} {}",
        connector.quote_table(table),
        connector.quote_column(constraint),
        behavior.as_sql()
    );
    run_ddl(connector, sql).await
}

pub async fn drop_index<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
    index: &str,
) -> Result<(), DeskError> {
    let sql = format!(
        "ALTER TABLE {} DROP INDEX {}",
        connector.quote_table(table),
        connector.quote_column(index)
    );
    run_ddl(connector, sql).await
}

pub async fn drop_table<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
) -> Result<(), DeskError> {
    run_ddl(connector, format!("DROP TABLE {}", connector.quote_table(table))).await
}

pub async fn rename_table<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
    new_name: &str,
) -> Result<(), DeskError> {
    let sql = format!(
        "ALTER TABLE {} RENAME TO {}",
        connector.quote_table(table),
        connector.quote_table(new_name)
    );
    run_ddl(connector, sql).await
}

pub async fn create_database<C: Connector + ?Sized>(
    connector: &C,
    database: &str,
) -> Result<(), DeskError> {
    run_ddl(connector, format!("CREATE DATABASE {}", connector.quote_table(database))).await
}

/// Drop `database`, then close the pooled connections that pointed at it.
pub async fn drop_database<C: Connector + ?Sized>(
    connector: &C,
    database: &str,
) -> Result<(), DeskError> {
    run_ddl(connector, format!("DROP DATABASE {}", connector.quote_table(database))).await?;
    let context = connector.context();
    let closed = context.pool().close_database(&context.target().with_database(database)).await;
    tracing::info!(database, closed, "Dropped database");
    Ok(())
}

// ========== Privileges ==========

pub async fn grant_privileges<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
    grantee: &str,
    privileges: &[&str],
) -> Result<(), DeskError> {
    let dialect = connector.dialect();
    let sql = format!(
        "GRANT {} ON {} TO {}",
        statement::privilege_list(dialect, privileges)?,
        connector.quote_table(table),
        dialect.grantee(grantee)
    );
    run_ddl(connector, sql).await
}

pub async fn revoke_privileges<C: Connector + ?Sized>(
    connector: &C,
    table: &str,
    grantee: &str,
    privileges: &[&str],
) -> Result<(), DeskError> {
    let dialect = connector.dialect();
    let sql = format!(
        "REVOKE {} ON {} FROM {}",
        statement::privilege_list(dialect, privileges)?,
        connector.quote_table(table),
        dialect.grantee(grantee)
    );
    run_ddl(connector, sql).await
}
