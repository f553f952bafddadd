#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use pixeltrace_api::config::{ProviderConfig, ServerConfig};
use pixeltrace_api::router::build_app_router;
use pixeltrace_api::state::AppState;
use pixeltrace_core::callback::CALLBACK_SECRET_HEADER;
use pixeltrace_db::{JobStore, MemoryJobStore};
use pixeltrace_provider::{ComputeProvider, DispatchRequest, ProviderError};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const TEST_SECRET: &str = "test-callback-secret";

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout.
pub fn test_config(callback_secret: Option<&str>) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        public_base_url: "http://coordinator.test".to_string(),
        callback_secret: callback_secret.map(str::to_string),
        database_url: None,
        max_jobs: 1_000,
        provider: ProviderConfig::Process {
            command: "unused".to_string(),
        },
    }
}

/// Compute provider that records every dispatch and answers from a script.
pub struct FakeProvider {
    calls: AtomicUsize,
    requests: std::sync::Mutex<Vec<DispatchRequest>>,
    fail_with: Option<u16>,
}

impl FakeProvider {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            requests: std::sync::Mutex::new(Vec::new()),
            fail_with: None,
        })
    }

    /// Every dispatch fails with the given HTTP status.
    pub fn failing(status: u16) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            requests: std::sync::Mutex::new(Vec::new()),
            fail_with: Some(status),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<DispatchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ComputeProvider for FakeProvider {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<Value, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        match self.fail_with {
            Some(status) => Err(ProviderError::Api {
                status,
                body: "provider unavailable".into(),
            }),
            None => Ok(json!({"id": format!("remote-{}", request.job_id), "status": "IN_QUEUE"})),
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// A running test app plus handles to its collaborators.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryJobStore>,
    pub provider: Arc<FakeProvider>,
}

/// Build the full application router with all middleware layers around an
/// in-memory store and any provider.
///
/// Mirrors the wiring in `main.rs` so integration tests exercise the same
/// middleware stack production uses.
pub fn build_router(
    provider: Arc<dyn ComputeProvider>,
    callback_secret: Option<&str>,
) -> (Router, Arc<MemoryJobStore>) {
    build_router_with_config(test_config(callback_secret), provider)
}

pub fn build_router_with_config(
    config: ServerConfig,
    provider: Arc<dyn ComputeProvider>,
) -> (Router, Arc<MemoryJobStore>) {
    let store = Arc::new(MemoryJobStore::with_capacity(config.max_jobs));
    let store_dyn: Arc<dyn JobStore> = store.clone();
    let state = AppState::new(config, store_dyn, provider);
    (build_app_router(state), store)
}

pub fn build_test_app_with(provider: Arc<FakeProvider>, callback_secret: Option<&str>) -> TestApp {
    let provider_dyn: Arc<dyn ComputeProvider> = provider.clone();
    let (router, store) = build_router(provider_dyn, callback_secret);
    TestApp {
        router,
        store,
        provider,
    }
}

/// Test app with an accepting provider and [`TEST_SECRET`] configured.
pub fn build_test_app() -> TestApp {
    build_test_app_with(FakeProvider::accepting(), Some(TEST_SECRET))
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response {
    post_raw(app, uri, body.to_string(), None).await
}

pub async fn post_raw(app: &Router, uri: &str, body: String, secret: Option<&str>) -> Response {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(secret) = secret {
        builder = builder.header(CALLBACK_SECRET_HEADER, secret);
    }
    app.clone()
        .oneshot(builder.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

pub async fn submit(app: &Router, body: Value) -> (StatusCode, Value) {
    let response = post_json(app, "/api/v1/submit", body).await;
    let status = response.status();
    (status, body_json(response).await)
}

pub async fn callback(app: &Router, body: Value, secret: Option<&str>) -> (StatusCode, Value) {
    let response = post_raw(app, "/api/v1/callback", body.to_string(), secret).await;
    let status = response.status();
    (status, body_json(response).await)
}

pub async fn status(app: &Router, job_id: &str) -> (StatusCode, Value) {
    let response = get(app, &format!("/api/v1/status/{job_id}")).await;
    let status = response.status();
    (status, body_json(response).await)
}
