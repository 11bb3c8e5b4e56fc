//! Shared types and constants for the SQLite Explorer.
//!
//! Everything that crosses the boundary between the storage layer
//! (`explorer-db`) and the HTTP layer (`explorer-server`) lives here:
//! validated schema identifiers, validated database file names, and the
//! row representation handed to the view renderer.
//!
//! Identifiers chosen by users end up interpolated into SQL text (table and
//! column names cannot be bound as parameters), so the only way to obtain an
//! [`Ident`] is through validation against a strict allow-list.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Name of the implicit identity column present on every table.
pub const IDENTITY_COLUMN: &str = "id";

/// File extension recognised as a database file in the database directory.
pub const DATABASE_EXTENSION: &str = "db";

/// Maximum length of a table or column name.
pub const MAX_IDENT_LEN: usize = 64;

/// Maximum length of a database file name, extension included.
pub const MAX_DATABASE_NAME_LEN: usize = 128;

/// Errors produced when validating user-supplied names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentError {
    #[error("name must not be empty")]
    Empty,
    #[error("name '{0}' is too long")]
    TooLong(String),
    #[error("name '{0}' may only contain letters, digits and underscores, and must not start with a digit")]
    InvalidCharacters(String),
    #[error("name '{0}' is reserved")]
    Reserved(String),
    #[error("'{0}' is not a valid database file name")]
    InvalidDatabaseName(String),
}

/// A validated SQL identifier (table or column name).
///
/// Matches `^[A-Za-z_][A-Za-z0-9_]{0,63}$` and never starts with `sqlite_`,
/// a prefix SQLite reserves for its own catalog tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ident(String);

impl Ident {
    /// Validates `raw` and wraps it.
    ///
    /// # Errors
    ///
    /// Returns `IdentError` when the name is empty, too long, contains
    /// characters outside the allow-list, or uses the reserved prefix.
    pub fn parse(raw: &str) -> Result<Self, IdentError> {
        if raw.is_empty() {
            return Err(IdentError::Empty);
        }
        if raw.len() > MAX_IDENT_LEN {
            return Err(IdentError::TooLong(raw.to_string()));
        }

        let mut chars = raw.chars();
        let first_ok = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !first_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(IdentError::InvalidCharacters(raw.to_string()));
        }

        if raw.to_ascii_lowercase().starts_with("sqlite_") {
            return Err(IdentError::Reserved(raw.to_string()));
        }

        Ok(Self(raw.to_string()))
    }

    /// Returns the identifier as written by the user.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the identifier double-quoted for interpolation into SQL.
    ///
    /// Validation already excludes quote characters, so no escaping is needed.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }

    /// Whether this identifier names the implicit identity column.
    pub fn is_identity(&self) -> bool {
        self.0.eq_ignore_ascii_case(IDENTITY_COLUMN)
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Ident {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Ident {
    type Error = IdentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Ident> for String {
    fn from(value: Ident) -> Self {
        value.0
    }
}

/// A validated database file name, e.g. `shop.db`.
///
/// A `DatabaseName` is always a single plain path component ending in
/// `.db`, so joining it onto the database directory can never escape it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatabaseName(String);

impl DatabaseName {
    /// Validates an exact file name (extension required).
    ///
    /// # Errors
    ///
    /// Returns `IdentError::InvalidDatabaseName` for anything that is not a
    /// plain `<stem>.db` file name.
    pub fn parse(raw: &str) -> Result<Self, IdentError> {
        if raw.is_empty() {
            return Err(IdentError::Empty);
        }
        if raw.len() > MAX_DATABASE_NAME_LEN {
            return Err(IdentError::TooLong(raw.to_string()));
        }

        let invalid = || IdentError::InvalidDatabaseName(raw.to_string());

        let stem = raw
            .strip_suffix(DATABASE_EXTENSION)
            .and_then(|s| s.strip_suffix('.'))
            .ok_or_else(invalid)?;

        if stem.is_empty()
            || stem.starts_with('.')
            || raw
                .chars()
                .any(|c| c == '/' || c == '\\' || c == ':' || c.is_control())
        {
            return Err(invalid());
        }

        Ok(Self(raw.to_string()))
    }

    /// Normalises landing-form input: `shop` becomes `shop.db`, while
    /// `shop.db` is accepted as-is.
    ///
    /// # Errors
    ///
    /// Same as [`DatabaseName::parse`] on the normalised name.
    pub fn from_input(raw: &str) -> Result<Self, IdentError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(IdentError::Empty);
        }
        let suffix = format!(".{DATABASE_EXTENSION}");
        if raw.ends_with(&suffix) {
            Self::parse(raw)
        } else {
            Self::parse(&format!("{raw}{suffix}"))
        }
    }

    /// Returns the file name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatabaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DatabaseName {
    type Error = IdentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DatabaseName> for String {
    fn from(value: DatabaseName) -> Self {
        value.0
    }
}

/// One table row: its identity plus the values of the editable columns.
///
/// `values` is positionally aligned with the column list it was fetched
/// with. `NULL` cells are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Engine-assigned identity.
    pub id: i64,
    /// Cell values, in column order.
    pub values: Vec<Option<String>>,
}

impl Row {
    /// Returns the value at `index`, rendering `NULL` as an empty string.
    pub fn value_or_empty(&self, index: usize) -> &str {
        self.values
            .get(index)
            .and_then(|v| v.as_deref())
            .unwrap_or("")
    }
}

/// Rows of a table together with the column list they are aligned to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableData {
    /// Editable column names in catalog order (identity excluded).
    pub columns: Vec<String>,
    /// Rows ordered by identity ascending.
    pub rows: Vec<Row>,
}
