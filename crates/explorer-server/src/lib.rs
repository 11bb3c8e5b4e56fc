//! SQLite Explorer server library logic.

pub mod api;
pub mod api_databases;
pub mod api_rows;
pub mod api_tables;
pub mod config;
pub mod middleware;
pub mod session;
pub mod views;

use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Extension, Json, Router,
};
use config::{Config, SessionStoreKind};
use explorer_db::{DatabaseDir, DbError, DbRuntimeSettings};
use rand::RngCore;
use serde_json::{json, Value};
use session::{CookieSigner, MemorySessionStore, SessionStore, SignedCookieStore};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Folder holding the database files.
    pub databases: DatabaseDir,
    /// Session storage backend.
    pub sessions: Arc<dyn SessionStore>,
    /// Name of the session cookie.
    pub cookie_name: String,
}

impl AppState {
    /// Builds state from configuration, creating the database directory.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Io` if the database directory cannot be created.
    pub fn from_config(config: &Config) -> Result<Self, DbError> {
        let databases = DatabaseDir::create(
            &config.databases.dir,
            DbRuntimeSettings {
                busy_timeout_ms: config.databases.busy_timeout_ms,
            },
        )?;

        let signer = match &config.session.secret {
            Some(secret) => CookieSigner::from_secret(secret.as_bytes()),
            None => {
                tracing::warn!(
                    "session.secret is not set; using a random secret, sessions will not survive a restart"
                );
                let mut secret = [0u8; 32];
                rand::thread_rng().fill_bytes(&mut secret);
                CookieSigner::from_secret(&secret)
            }
        };

        let sessions: Arc<dyn SessionStore> = match config.session.store {
            SessionStoreKind::Cookie => Arc::new(SignedCookieStore::new(signer)),
            SessionStoreKind::Memory => Arc::new(MemorySessionStore::new(signer)),
        };

        Ok(Self {
            databases,
            sessions,
            cookie_name: config.session.cookie_name.clone(),
        })
    }
}

/// Maximum request body size (1 MiB). Forms here are a handful of fields.
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let pages = Router::new()
        .route(
            "/",
            get(api_databases::home_handler).post(api_databases::select_database_handler),
        )
        .route(
            "/switch_db/{name}",
            get(api_databases::switch_database_handler),
        )
        .route(
            "/create_table",
            get(api_tables::create_table_form_handler).post(api_tables::create_table_handler),
        )
        .route(
            "/table/{name}",
            get(api_tables::view_table_handler).post(api_tables::insert_row_handler),
        )
        .route(
            "/delete/{name}/{row_id}",
            get(api_rows::delete_row_handler),
        )
        .route(
            "/edit/{name}/{row_id}",
            get(api_rows::edit_row_form_handler).post(api_rows::update_row_handler),
        )
        .fallback(api::not_found_handler)
        .layer(axum::middleware::from_fn(middleware::session_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(pages)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
