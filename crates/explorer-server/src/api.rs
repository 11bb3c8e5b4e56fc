//! Shared handler plumbing: the error type, blocking database access, form
//! parsing, and the mapping from storage errors to user-facing notices.

use crate::middleware::SessionHandle;
use crate::session::Notice;
use crate::views;
use explorer_db::DbError;
use explorer_types::DatabaseName;
use axum::{
    body::Bytes,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use thiserror::Error;

/// Failures that cannot be turned into a notice and a redirect.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, title) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "Not Found"),
            ApiError::InternalServerError(msg) => {
                tracing::error!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        };
        let message = match self {
            ApiError::NotFound(msg) => msg,
            ApiError::InternalServerError(_) => "The request could not be completed.".to_string(),
        };
        (status, Html(views::error_page(title, &message))).into_response()
    }
}

/// Fallback for unknown routes.
pub async fn not_found_handler(uri: axum::http::Uri) -> ApiError {
    ApiError::NotFound(format!("no page at {}", uri.path()))
}

/// Runs blocking storage work on the blocking thread pool.
///
/// The outer `Result` carries infrastructure failures; the inner one carries
/// the storage outcome for the handler to turn into a notice.
pub async fn run_blocking<T, F>(f: F) -> Result<Result<T, DbError>, ApiError>
where
    F: FnOnce() -> Result<T, DbError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::InternalServerError(format!("task join error: {}", e)))
}

/// Parses an `application/x-www-form-urlencoded` body into ordered pairs.
///
/// Repeated keys are preserved, which `axum::Form` cannot express.
pub fn parse_form(body: &Bytes) -> Vec<(String, String)> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

/// Returns the first value for `key`.
pub fn form_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Returns the session's active database, or `None` if nothing is
/// selected.
pub fn active_database(session: &SessionHandle) -> Option<DatabaseName> {
    session.with(|s| s.active_database().cloned())
}

/// Queues `notice` and redirects to `to`.
pub fn redirect_with(session: &SessionHandle, notice: Notice, to: &str) -> Response {
    session.with(|s| s.push_notice(notice));
    Redirect::to(to).into_response()
}

/// Redirect to the landing page, used whenever no database is selected.
pub fn to_home() -> Response {
    Redirect::to("/").into_response()
}

/// Turns a storage error into the notice shown to the user.
///
/// `action` describes what was attempted, e.g. "Failed to insert data".
pub fn notice_for(action: &str, err: &DbError) -> Notice {
    if err.is_busy() {
        return Notice::error(format!(
            "{action}: the database is busy, please try again."
        ));
    }
    let message = match err {
        DbError::TableExists(_) => "Table already exists!".to_string(),
        DbError::MissingColumns => "Table name and columns are required!".to_string(),
        DbError::TableNotFound(t) => format!("Table '{t}' not found."),
        DbError::DatabaseNotFound(d) => format!("Database '{d}' does not exist."),
        DbError::InvalidName(e) => format!("{action}: {e}."),
        DbError::ColumnMismatch { .. } => {
            format!("{action}: submitted fields do not match the table's columns.")
        }
        DbError::Database(e) => format!("{action}: {e}"),
        DbError::Io(_) => format!("{action}: the database directory is not accessible."),
    };
    Notice::error(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_form_keeps_repeated_keys_in_order() {
        let body = Bytes::from_static(b"table_name=items&columns=name&columns=price&x=a%20b+c");
        let pairs = parse_form(&body);
        assert_eq!(
            pairs,
            vec![
                ("table_name".to_string(), "items".to_string()),
                ("columns".to_string(), "name".to_string()),
                ("columns".to_string(), "price".to_string()),
                ("x".to_string(), "a b c".to_string()),
            ]
        );
        assert_eq!(form_value(&pairs, "columns"), Some("name"));
        assert_eq!(form_value(&pairs, "missing"), None);
    }

    #[test]
    fn notices_for_known_conditions() {
        assert_eq!(
            notice_for("Create table", &DbError::TableExists("t".into())).message,
            "Table already exists!"
        );
        assert_eq!(
            notice_for("Create table", &DbError::MissingColumns).message,
            "Table name and columns are required!"
        );
        let busy = DbError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        ));
        assert!(notice_for("Failed to insert data", &busy)
            .message
            .contains("busy"));
    }
}
