//! Landing page and database selection.

use crate::api::{form_value, notice_for, parse_form, redirect_with, run_blocking, ApiError};
use crate::middleware::SessionHandle;
use crate::session::Notice;
use crate::{views, AppState};
use axum::{
    extract::{Extension, Path, RawForm},
    response::{Html, IntoResponse, Redirect, Response},
};
use explorer_db::{list_tables, DbError};
use explorer_types::DatabaseName;
use std::sync::Arc;

/// GET /
///
/// Lists the database files and, when one is selected, its tables.
pub async fn home_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Result<Response, ApiError> {
    let active = session.with(|s| s.active_database().cloned());

    let dir = state.databases.clone();
    let active_clone = active.clone();
    let (databases, tables) = run_blocking(move || {
        // Opening first creates a newly selected file, so it shows up in
        // the listing below.
        let tables = active_clone
            .as_ref()
            .map(|name| dir.open(name).and_then(|conn| list_tables(&conn)));
        let databases = dir.list()?;
        Ok((databases, tables))
    })
    .await?
    .unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to read database directory");
        session.with(|s| s.push_notice(notice_for("Failed to list databases", &e)));
        (Vec::new(), None)
    });

    let tables = match tables {
        Some(Ok(tables)) => tables,
        Some(Err(e)) => {
            tracing::warn!(database = ?active, error = %e, "failed to list tables");
            session.with(|s| s.push_notice(notice_for("Failed to list tables", &e)));
            Vec::new()
        }
        None => Vec::new(),
    };

    let notices = session.with(|s| s.take_notices());
    Ok(Html(views::home_page(&databases, active.as_ref(), &tables, &notices)).into_response())
}

/// POST /
///
/// Selects `db_name` (normalised to `<name>.db`) as the active database.
/// The file itself is created on first connection.
pub async fn select_database_handler(
    Extension(session): Extension<SessionHandle>,
    RawForm(body): RawForm,
) -> Response {
    let form = parse_form(&body);
    let raw = form_value(&form, "db_name").unwrap_or_default();
    if raw.trim().is_empty() {
        return redirect_with(&session, Notice::error("Database name is required!"), "/");
    }

    match DatabaseName::from_input(raw) {
        Ok(name) => {
            tracing::info!(database = %name, "selected database");
            session.with(|s| s.select_database(name));
            Redirect::to("/").into_response()
        }
        Err(e) => redirect_with(
            &session,
            notice_for("Cannot select database", &e.into()),
            "/",
        ),
    }
}

/// GET /switch_db/{name}
///
/// Selects an existing database file.
pub async fn switch_database_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let name = match DatabaseName::parse(&name) {
        Ok(name) => name,
        Err(e) => {
            return Ok(redirect_with(
                &session,
                notice_for("Cannot switch database", &e.into()),
                "/",
            ))
        }
    };

    let dir = state.databases.clone();
    let candidate = name.clone();
    let exists = run_blocking(move || Ok(dir.exists(&candidate)))
        .await?
        .unwrap_or(false);
    if !exists {
        return Ok(redirect_with(
            &session,
            notice_for(
                "Cannot switch database",
                &DbError::DatabaseNotFound(name.to_string()),
            ),
            "/",
        ));
    }

    tracing::info!(database = %name, "switched database");
    session.with(|s| s.select_database(name));
    Ok(Redirect::to("/").into_response())
}
