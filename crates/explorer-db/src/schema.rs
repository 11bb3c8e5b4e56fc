//! Live schema introspection and table creation.

use crate::DbError;
use explorer_types::{Ident, IDENTITY_COLUMN};
use rusqlite::Connection;

/// Quotes a catalog-sourced name for interpolation into SQL.
///
/// Embedded double quotes are doubled, per the SQL standard.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Lists user tables, excluding SQLite's internal `sqlite_*` tables.
///
/// Order is whatever the catalog returns.
pub fn list_tables(conn: &Connection) -> Result<Vec<String>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND substr(name, 1, 7) != 'sqlite_'",
    )?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut tables = Vec::new();
    for row in rows {
        tables.push(row?);
    }
    Ok(tables)
}

/// Whether a table with this name exists (case-insensitively, as SQLite
/// resolves names).
pub fn table_exists(conn: &Connection, table: &Ident) -> Result<bool, DbError> {
    let exists = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type = 'table' AND name = ?1 COLLATE NOCASE
        )",
        [table.as_str()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub(crate) fn ensure_table(conn: &Connection, table: &Ident) -> Result<(), DbError> {
    if table_exists(conn, table)? {
        Ok(())
    } else {
        Err(DbError::TableNotFound(table.to_string()))
    }
}

/// Lists the editable columns of `table` in catalog order.
///
/// The identity column is excluded.
///
/// # Errors
///
/// Returns `DbError::TableNotFound` if the table does not exist.
pub fn list_columns(conn: &Connection, table: &Ident) -> Result<Vec<String>, DbError> {
    ensure_table(conn, table)?;

    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
    let rows = stmt.query_map([table.as_str()], |row| row.get::<_, String>(0))?;
    let mut columns = Vec::new();
    for row in rows {
        let name = row?;
        if !name.eq_ignore_ascii_case(IDENTITY_COLUMN) {
            columns.push(name);
        }
    }
    Ok(columns)
}

/// Creates `table` with an auto-incrementing `id` primary key and one
/// `TEXT` column per entry in `columns`.
///
/// Duplicate column names are passed through; SQLite rejects them.
///
/// # Errors
///
/// - `DbError::MissingColumns` if `columns` is empty (nothing is executed).
/// - `DbError::TableExists` if the table is already present; the existing
///   table is left untouched.
/// - `DbError::Database` for any engine failure.
pub fn create_table(conn: &Connection, table: &Ident, columns: &[Ident]) -> Result<(), DbError> {
    if columns.is_empty() {
        return Err(DbError::MissingColumns);
    }
    if table_exists(conn, table)? {
        return Err(DbError::TableExists(table.to_string()));
    }

    let column_defs = columns
        .iter()
        .map(|c| format!("{} TEXT", c.quoted()))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "CREATE TABLE {} ({} INTEGER PRIMARY KEY AUTOINCREMENT, {})",
        table.quoted(),
        IDENTITY_COLUMN,
        column_defs
    );

    match conn.execute(&sql, []) {
        Ok(_) => {
            tracing::info!(table = %table, columns = columns.len(), "created table");
            Ok(())
        }
        // Another connection may have created it between the check and the
        // statement.
        Err(rusqlite::Error::SqliteFailure(_, Some(msg))) if msg.contains("already exists") => {
            Err(DbError::TableExists(table.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}
