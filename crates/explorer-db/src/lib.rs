//! Storage layer for the SQLite Explorer.
//!
//! Provides the database directory (listing and opening `*.db` files),
//! live schema introspection against the SQLite catalog, table creation,
//! and row-level CRUD. Every function takes a plain `rusqlite::Connection`
//! and runs at most one write statement; callers own the connection and
//! drop it at the end of the request.
//!
//! # Design decisions
//!
//! - **No pool**: each request opens its own connection through
//!   [`DatabaseDir::open`], because the target file changes per session.
//! - **No cached metadata**: tables and columns are read from
//!   `sqlite_master` / `pragma_table_info` on every call.
//! - **Quoted identifiers**: user-supplied names arrive as validated
//!   [`explorer_types::Ident`]s; names read back from the catalog are quoted
//!   with [`quote_ident`]. Values are always bound as parameters.

mod directory;
mod rows;
mod schema;

pub use directory::{DatabaseDir, DbRuntimeSettings};
pub use rows::{delete_row, get_row, insert_row, list_rows, update_row};
pub use schema::{create_table, list_columns, list_tables, quote_ident, table_exists};

use explorer_types::IdentError;
use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("database directory error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid name: {0}")]
    InvalidName(#[from] IdentError),

    #[error("database not found: {0}")]
    DatabaseNotFound(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("table already exists: {0}")]
    TableExists(String),

    #[error("at least one column is required")]
    MissingColumns,

    #[error("submitted fields {submitted:?} do not match table columns {expected:?}")]
    ColumnMismatch {
        /// Editable columns of the table.
        expected: Vec<String>,
        /// Field names present in the submission.
        submitted: Vec<String>,
    },
}

impl DbError {
    /// Whether the failure is lock contention on the database file.
    ///
    /// Busy errors are transient: the same request may succeed if retried
    /// once the competing writer finishes.
    pub fn is_busy(&self) -> bool {
        match self {
            DbError::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}
