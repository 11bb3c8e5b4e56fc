use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::session::Session;
use crate::AppState;

/// The current request's session, stored in request extensions.
///
/// Cloning shares the same underlying session, so the middleware observes
/// whatever the handler changed.
#[derive(Clone, Debug)]
pub struct SessionHandle(Arc<Mutex<Session>>);

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                // Session mutations are single field writes.
                tracing::error!("session lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Runs `f` with mutable access to the session.
    pub fn with<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        f(&mut self.lock())
    }

    fn snapshot(&self) -> Session {
        self.lock().clone()
    }
}

/// Extracts the value of cookie `name` from the request headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// Middleware that loads the session before the handler and persists it
/// afterwards.
///
/// A `Set-Cookie` header is only emitted when the session changed.
pub async fn session_middleware(
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?
        .clone();

    let cookie = read_cookie(req.headers(), &state.cookie_name);
    let handle = SessionHandle::new(state.sessions.load(cookie.as_deref()));
    req.extensions_mut().insert(handle.clone());

    let mut response = next.run(req).await;

    let session = handle.snapshot();
    if session.is_dirty() {
        let value = state.sessions.save(&session);
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            state.cookie_name, value
        );
        match HeaderValue::from_str(&cookie) {
            Ok(v) => {
                response.headers_mut().append(header::SET_COOKIE, v);
            }
            Err(e) => tracing::error!(error = %e, "session cookie is not a valid header value"),
        }
    }

    Ok(response)
}
