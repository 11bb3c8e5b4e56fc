//! The database directory: enumeration and connection opening.

use crate::DbError;
use explorer_types::{DatabaseName, DATABASE_EXTENSION};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime tunables for SQLite connection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// Busy timeout for SQLite connections, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
        }
    }
}

/// A folder holding one SQLite file per logical database.
///
/// Cheap to clone; holds no open handles.
#[derive(Debug, Clone)]
pub struct DatabaseDir {
    root: PathBuf,
    settings: DbRuntimeSettings,
}

impl DatabaseDir {
    /// Opens (creating if needed) the database directory at `root`.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Io` if the directory cannot be created.
    pub fn create(root: impl Into<PathBuf>, settings: DbRuntimeSettings) -> Result<Self, DbError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        tracing::debug!(path = %root.display(), "database directory ready");
        Ok(Self { root, settings })
    }

    /// Returns the directory path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the connection settings applied to every opened connection.
    pub fn settings(&self) -> DbRuntimeSettings {
        self.settings
    }

    /// Lists the `*.db` files currently present.
    ///
    /// Order follows filesystem enumeration and is not stable. Entries that
    /// are not regular files or whose names are not valid database names
    /// are skipped.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Io` if the directory cannot be read.
    pub fn list(&self) -> Result<Vec<DatabaseName>, DbError> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DATABASE_EXTENSION) {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            match DatabaseName::parse(&file_name) {
                Ok(name) => names.push(name),
                Err(e) => tracing::debug!(file = %file_name, error = %e, "skipping database file"),
            }
        }
        Ok(names)
    }

    /// Resolves `name` to its path inside the directory.
    pub fn path_of(&self, name: &DatabaseName) -> PathBuf {
        self.root.join(name.as_str())
    }

    /// Whether the database file exists.
    pub fn exists(&self, name: &DatabaseName) -> bool {
        self.path_of(name).is_file()
    }

    /// Opens a connection to `name`, creating the file if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Database` if SQLite cannot open the file.
    pub fn open(&self, name: &DatabaseName) -> Result<Connection, DbError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        self.open_with_flags(name, flags)
    }

    /// Opens a connection to `name`, which must already exist.
    ///
    /// # Errors
    ///
    /// Returns `DbError::DatabaseNotFound` if there is no such file.
    pub fn open_existing(&self, name: &DatabaseName) -> Result<Connection, DbError> {
        if !self.exists(name) {
            return Err(DbError::DatabaseNotFound(name.to_string()));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        self.open_with_flags(name, flags)
    }

    fn open_with_flags(&self, name: &DatabaseName, flags: OpenFlags) -> Result<Connection, DbError> {
        let path = self.path_of(name);
        let conn = Connection::open_with_flags(&path, flags)?;
        conn.busy_timeout(Duration::from_millis(self.settings.busy_timeout_ms))?;
        tracing::debug!(database = %name, "opened database connection");
        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir() -> (tempfile::TempDir, DatabaseDir) {
        let tmp = tempfile::tempdir().expect("should create temp dir");
        let dir = DatabaseDir::create(tmp.path().join("databases"), DbRuntimeSettings::default())
            .expect("should create database dir");
        (tmp, dir)
    }

    #[test]
    fn create_makes_missing_directory() {
        let (_tmp, dir) = dir();
        assert!(dir.root().is_dir());
        assert!(dir.list().unwrap().is_empty());
    }

    #[test]
    fn open_creates_file_lazily() {
        let (_tmp, dir) = dir();
        let name = DatabaseName::parse("shop.db").unwrap();
        assert!(!dir.exists(&name));

        let conn = dir.open(&name).expect("open should create the file");
        drop(conn);

        assert!(dir.exists(&name));
        let listed: Vec<String> = dir.list().unwrap().into_iter().map(String::from).collect();
        assert_eq!(listed, vec!["shop.db".to_string()]);
    }

    #[test]
    fn open_existing_rejects_missing_file() {
        let (_tmp, dir) = dir();
        let name = DatabaseName::parse("ghost.db").unwrap();
        let err = dir.open_existing(&name).unwrap_err();
        assert!(matches!(err, DbError::DatabaseNotFound(n) if n == "ghost.db"));
        assert!(!dir.exists(&name), "must not create the file");
    }

    #[test]
    fn reopening_does_not_truncate() {
        let (_tmp, dir) = dir();
        let name = DatabaseName::parse("keep.db").unwrap();
        {
            let conn = dir.open(&name).unwrap();
            conn.execute_batch("CREATE TABLE t (v TEXT); INSERT INTO t VALUES ('x');")
                .unwrap();
        }

        let conn = dir.open_existing(&name).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn list_ignores_other_extensions_and_directories() {
        let (_tmp, dir) = dir();
        std::fs::write(dir.root().join("notes.txt"), b"hi").unwrap();
        std::fs::write(dir.root().join("a.db-journal"), b"").unwrap();
        std::fs::create_dir(dir.root().join("nested.db")).unwrap();
        std::fs::write(dir.root().join("b.db"), b"").unwrap();

        let listed: Vec<String> = dir.list().unwrap().into_iter().map(String::from).collect();
        assert_eq!(listed, vec!["b.db".to_string()]);
    }

    #[test]
    fn busy_timeout_is_applied() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DatabaseDir::create(
            tmp.path(),
            DbRuntimeSettings {
                busy_timeout_ms: 1_234,
            },
        )
        .unwrap();
        let conn = dir.open(&DatabaseName::parse("t.db").unwrap()).unwrap();
        let timeout: i64 = conn
            .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(timeout, 1_234);
    }
}
