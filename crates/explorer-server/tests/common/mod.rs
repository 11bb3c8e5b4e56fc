#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use explorer_server::config::{Config, SessionStoreKind};
use explorer_server::{app, AppState};
use tower::ServiceExt;

/// A router over a throwaway database directory plus a one-cookie jar.
pub struct TestClient {
    pub router: Router,
    pub dir: tempfile::TempDir,
    pub cookie: Option<String>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

impl TestClient {
    pub fn new() -> Self {
        Self::with_store(SessionStoreKind::Cookie)
    }

    pub fn with_store(store: SessionStoreKind) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let mut config = Config::default();
        config.databases.dir = dir.path().join("databases").display().to_string();
        config.session.secret = Some("test-secret".to_string());
        config.session.store = store;
        let state = AppState::from_config(&config).expect("failed to build state");
        Self {
            router: app(state),
            dir,
            cookie: None,
        }
    }

    pub fn databases_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("databases")
    }

    async fn send(&mut self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();

        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie
                .to_str()
                .unwrap()
                .split(';')
                .next()
                .unwrap()
                .to_string();
            self.cookie = Some(pair);
        }

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        TestResponse {
            status,
            location,
            body: String::from_utf8(body.to_vec()).unwrap(),
        }
    }

    fn builder(&self, method: &str, uri: &str) -> axum::http::request::Builder {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        let request = self.builder("GET", uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn post(&mut self, uri: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let request = self
            .builder("POST", uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Selects (and lazily creates) a database through the landing form.
    pub async fn select(&mut self, db_name: &str) {
        let response = self.post("/", &[("db_name", db_name)]).await;
        assert_eq!(response.status, StatusCode::SEE_OTHER);
        assert_eq!(response.location.as_deref(), Some("/"));
    }

    pub async fn create_table(&mut self, table: &str, columns: &[&str]) -> TestResponse {
        let mut fields = vec![("table_name", table)];
        fields.extend(columns.iter().map(|c| ("columns", *c)));
        self.post("/create_table", &fields).await
    }
}

/// Extracts the `<td>` cell texts of each data row in a table page.
pub fn table_rows(body: &str) -> Vec<Vec<String>> {
    body.split("<tr>")
        .skip(2)
        .map(|row| {
            row.split("<td>")
                .skip(1)
                .map(|cell| cell.split("</td>").next().unwrap_or("").to_string())
                .collect::<Vec<_>>()
        })
        .collect()
}
