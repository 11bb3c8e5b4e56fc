//! Table creation, table view, and row insertion.

use crate::api::{
    active_database, form_value, notice_for, parse_form, redirect_with, run_blocking, to_home,
    ApiError,
};
use crate::middleware::SessionHandle;
use crate::session::Notice;
use crate::views::{self, table_path};
use crate::AppState;
use axum::{
    extract::{Extension, Path, RawForm},
    response::{Html, IntoResponse, Redirect, Response},
};
use explorer_db::{create_table, insert_row, list_rows, DbError};
use explorer_types::Ident;
use std::sync::Arc;

/// Form keys accepted for the repeated column field.
const COLUMN_KEYS: [&str; 2] = ["columns", "columns[]"];

/// GET /create_table
pub async fn create_table_form_handler(Extension(session): Extension<SessionHandle>) -> Response {
    if active_database(&session).is_none() {
        return to_home();
    }
    let notices = session.with(|s| s.take_notices());
    Html(views::create_table_page(&notices)).into_response()
}

/// POST /create_table
///
/// Creates the table and redirects to its view. Validation failures and
/// engine errors send the user back to the form with a notice.
pub async fn create_table_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    RawForm(body): RawForm,
) -> Result<Response, ApiError> {
    let Some(database) = active_database(&session) else {
        return Ok(to_home());
    };

    let form = parse_form(&body);
    let table_name = form_value(&form, "table_name").unwrap_or_default().trim();
    // Blank inputs left over from "Add Column" are ignored.
    let column_names: Vec<&str> = form
        .iter()
        .filter(|(k, _)| COLUMN_KEYS.contains(&k.as_str()))
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
        .collect();

    if table_name.is_empty() || column_names.is_empty() {
        return Ok(redirect_with(
            &session,
            notice_for("Create table", &DbError::MissingColumns),
            "/create_table",
        ));
    }

    let parsed = Ident::parse(table_name).and_then(|table| {
        column_names
            .iter()
            .map(|c| Ident::parse(c))
            .collect::<Result<Vec<_>, _>>()
            .map(|columns| (table, columns))
    });
    let (table, columns) = match parsed {
        Ok(v) => v,
        Err(e) => {
            return Ok(redirect_with(
                &session,
                notice_for("Cannot create table", &e.into()),
                "/create_table",
            ))
        }
    };

    let dir = state.databases.clone();
    let target = table.clone();
    let outcome = run_blocking(move || {
        let conn = dir.open(&database)?;
        create_table(&conn, &target, &columns)
    })
    .await?;

    match outcome {
        Ok(()) => {
            tracing::info!(table = %table, "created table");
            Ok(redirect_with(
                &session,
                Notice::info(format!("Table '{table}' created.")),
                &table_path(table.as_str()),
            ))
        }
        Err(e) => {
            tracing::warn!(table = %table, error = %e, "failed to create table");
            Ok(redirect_with(
                &session,
                notice_for("Cannot create table", &e),
                "/create_table",
            ))
        }
    }
}

/// GET /table/{name}
///
/// Shows every row plus an insert form built from the live column list.
/// A missing or invalid table redirects to the landing page.
pub async fn view_table_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let Some(database) = active_database(&session) else {
        return Ok(to_home());
    };
    let table = match Ident::parse(&name) {
        Ok(table) => table,
        Err(e) => {
            return Ok(redirect_with(
                &session,
                notice_for("Cannot open table", &e.into()),
                "/",
            ))
        }
    };

    let dir = state.databases.clone();
    let target = table.clone();
    let outcome = run_blocking(move || {
        let conn = dir.open(&database)?;
        list_rows(&conn, &target)
    })
    .await?;

    match outcome {
        Ok(data) => {
            let notices = session.with(|s| s.take_notices());
            Ok(Html(views::table_page(table.as_str(), &data, &notices)).into_response())
        }
        Err(e) => {
            tracing::warn!(table = %table, error = %e, "failed to read table");
            Ok(redirect_with(&session, notice_for("Cannot open table", &e), "/"))
        }
    }
}

/// POST /table/{name}
///
/// Inserts one row from a form carrying one field per editable column.
pub async fn insert_row_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Path(name): Path<String>,
    RawForm(body): RawForm,
) -> Result<Response, ApiError> {
    let Some(database) = active_database(&session) else {
        return Ok(to_home());
    };
    let table = match Ident::parse(&name) {
        Ok(table) => table,
        Err(e) => {
            return Ok(redirect_with(
                &session,
                notice_for("Failed to insert data", &e.into()),
                "/",
            ))
        }
    };

    let values = parse_form(&body);
    let dir = state.databases.clone();
    let target = table.clone();
    let outcome = run_blocking(move || {
        let conn = dir.open(&database)?;
        insert_row(&conn, &target, &values)
    })
    .await?;

    let back = table_path(table.as_str());
    match outcome {
        Ok(row_id) => {
            tracing::info!(table = %table, row_id, "inserted row");
            Ok(Redirect::to(&back).into_response())
        }
        Err(e) => {
            tracing::warn!(table = %table, error = %e, "failed to insert row");
            Ok(redirect_with(
                &session,
                notice_for("Failed to insert data", &e),
                &back,
            ))
        }
    }
}
