//! Row deletion and editing.

use crate::api::{
    active_database, notice_for, parse_form, redirect_with, run_blocking, to_home, ApiError,
};
use crate::middleware::SessionHandle;
use crate::session::Notice;
use crate::views::{self, table_path};
use crate::AppState;
use axum::{
    extract::{Extension, Path, RawForm},
    response::{Html, IntoResponse, Redirect, Response},
};
use explorer_db::{delete_row, get_row, list_columns, update_row};
use explorer_types::Ident;
use std::sync::Arc;

/// GET /delete/{name}/{row_id}
///
/// Deleting an unknown row is a no-op. Always redirects to the table view.
pub async fn delete_row_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Path((name, row_id)): Path<(String, i64)>,
) -> Result<Response, ApiError> {
    let Some(database) = active_database(&session) else {
        return Ok(to_home());
    };
    let table = match Ident::parse(&name) {
        Ok(table) => table,
        Err(e) => {
            return Ok(redirect_with(
                &session,
                notice_for("Failed to delete row", &e.into()),
                "/",
            ))
        }
    };

    let dir = state.databases.clone();
    let target = table.clone();
    let outcome = run_blocking(move || {
        let conn = dir.open(&database)?;
        delete_row(&conn, &target, row_id)
    })
    .await?;

    let back = table_path(table.as_str());
    match outcome {
        Ok(removed) => {
            tracing::info!(table = %table, row_id, removed, "deleted row");
            Ok(Redirect::to(&back).into_response())
        }
        Err(e) => {
            tracing::warn!(table = %table, row_id, error = %e, "failed to delete row");
            Ok(redirect_with(
                &session,
                notice_for("Failed to delete row", &e),
                &back,
            ))
        }
    }
}

/// GET /edit/{name}/{row_id}
///
/// Shows the row's current values. An unknown row redirects to the table
/// view with "Row not found!".
pub async fn edit_row_form_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Path((name, row_id)): Path<(String, i64)>,
) -> Result<Response, ApiError> {
    let Some(database) = active_database(&session) else {
        return Ok(to_home());
    };
    let table = match Ident::parse(&name) {
        Ok(table) => table,
        Err(e) => {
            return Ok(redirect_with(
                &session,
                notice_for("Cannot edit row", &e.into()),
                "/",
            ))
        }
    };

    let dir = state.databases.clone();
    let target = table.clone();
    let outcome = run_blocking(move || {
        let conn = dir.open(&database)?;
        let columns = list_columns(&conn, &target)?;
        let row = get_row(&conn, &target, row_id)?;
        Ok((columns, row))
    })
    .await?;

    let back = table_path(table.as_str());
    match outcome {
        Ok((columns, Some(row))) => {
            let notices = session.with(|s| s.take_notices());
            Ok(Html(views::edit_page(table.as_str(), &columns, &row, &notices)).into_response())
        }
        Ok((_, None)) => Ok(redirect_with(&session, Notice::error("Row not found!"), &back)),
        Err(e) => {
            tracing::warn!(table = %table, row_id, error = %e, "failed to load row");
            Ok(redirect_with(&session, notice_for("Cannot edit row", &e), "/"))
        }
    }
}

/// POST /edit/{name}/{row_id}
///
/// Overwrites every editable column. Editing an unknown row changes
/// nothing and reports "Row not found!".
pub async fn update_row_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Path((name, row_id)): Path<(String, i64)>,
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
                notice_for("Failed to update row", &e.into()),
                "/",
            ))
        }
    };

    let values = parse_form(&body);
    let dir = state.databases.clone();
    let target = table.clone();
    let outcome = run_blocking(move || {
        let conn = dir.open(&database)?;
        update_row(&conn, &target, row_id, &values)
    })
    .await?;

    let back = table_path(table.as_str());
    match outcome {
        Ok(0) => Ok(redirect_with(&session, Notice::error("Row not found!"), &back)),
        Ok(_) => {
            tracing::info!(table = %table, row_id, "updated row");
            Ok(Redirect::to(&back).into_response())
        }
        Err(e) => {
            tracing::warn!(table = %table, row_id, error = %e, "failed to update row");
            Ok(redirect_with(
                &session,
                notice_for("Failed to update row", &e),
                &back,
            ))
        }
    }
}
