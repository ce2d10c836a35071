//! Shared mock backend for integration tests.

#![allow(dead_code)]

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use price_admin::session::{KeyValueStore, MemoryStore};
use price_admin::{ApiClient, ClientConfig, CredentialPair};

/// Mutable backend behaviour and counters.
pub struct BackendState {
    /// Access token the backend currently accepts.
    pub valid_token: Mutex<String>,
    /// Refresh token the backend currently accepts.
    pub refresh_token: Mutex<String>,
    /// Pair issued by the next successful refresh.
    pub next_pair: Mutex<(String, String)>,
    /// Raw body returned by a successful refresh instead of `next_pair`.
    pub refresh_body: Mutex<Option<Value>>,
    pub refresh_fails: AtomicBool,
    pub refresh_delay_ms: AtomicU64,
    pub refresh_calls: AtomicU32,
    /// Authorization header of every authenticated-route hit, in order.
    pub auth_headers: Mutex<Vec<Option<String>>>,
    pub status_hits: AtomicU32,
    pub flaky_remaining: AtomicU32,
    pub flaky_hits: AtomicU32,
    pub last_query: Mutex<HashMap<String, String>>,
}

impl Default for BackendState {
    fn default() -> Self {
        Self {
            valid_token: Mutex::new("T1".into()),
            refresh_token: Mutex::new("R1".into()),
            next_pair: Mutex::new(("T2".into(), "R2".into())),
            refresh_body: Mutex::new(None),
            refresh_fails: AtomicBool::new(false),
            refresh_delay_ms: AtomicU64::new(0),
            refresh_calls: AtomicU32::new(0),
            auth_headers: Mutex::new(Vec::new()),
            status_hits: AtomicU32::new(0),
            flaky_remaining: AtomicU32::new(0),
            flaky_hits: AtomicU32::new(0),
            last_query: Mutex::new(HashMap::new()),
        }
    }
}

impl BackendState {
    /// Make the backend reject the current access token.
    pub fn expire_access_token(&self) {
        *self.valid_token.lock().unwrap() = "expired".into();
    }

    pub fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn seen_headers(&self) -> Vec<Option<String>> {
        self.auth_headers.lock().unwrap().clone()
    }

    fn authorize(&self, headers: &HeaderMap) -> bool {
        let header = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.auth_headers.lock().unwrap().push(header.clone());

        let expected = format!("Bearer {}", self.valid_token.lock().unwrap());
        header.as_deref() == Some(expected.as_str())
    }
}

pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Arc<BackendState>,
}

impl MockBackend {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

type Shared = State<Arc<BackendState>>;

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"message": "token expired"})),
    )
        .into_response()
}

async fn login(State(state): Shared, Json(body): Json<Value>) -> Response {
    if body["email"] == "admin@example.com" && body["password"] == "secret" {
        *state.valid_token.lock().unwrap() = "T1".into();
        *state.refresh_token.lock().unwrap() = "R1".into();
        Json(json!({"access_token": "T1", "refresh_token": "R1"})).into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Invalid credentials"})),
        )
            .into_response()
    }
}

async fn refresh(State(state): Shared, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let expected = state.refresh_token.lock().unwrap().clone();
    if state.refresh_fails.load(Ordering::SeqCst) || body["refresh_token"] != expected.as_str() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "invalid refresh token"})),
        )
            .into_response();
    }

    if let Some(body) = state.refresh_body.lock().unwrap().clone() {
        return Json(body).into_response();
    }

    let (access, refresh) = state.next_pair.lock().unwrap().clone();
    *state.valid_token.lock().unwrap() = access.clone();
    *state.refresh_token.lock().unwrap() = refresh.clone();
    Json(json!({"access_token": access, "refresh_token": refresh})).into_response()
}

async fn item(State(state): Shared, headers: HeaderMap, Path(id): Path<String>) -> Response {
    if !state.authorize(&headers) {
        return unauthorized();
    }
    Json(json!({"id": id})).into_response()
}

async fn reject(State(state): Shared, headers: HeaderMap) -> Response {
    state.authorize(&headers);
    unauthorized()
}

async fn status(State(state): Shared, Path(code): Path<u16>) -> Response {
    state.status_hits.fetch_add(1, Ordering::SeqCst);
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({"message": "scripted failure"}))).into_response()
}

async fn flaky(State(state): Shared) -> Response {
    state.flaky_hits.fetch_add(1, Ordering::SeqCst);
    let remaining = state.flaky_remaining.load(Ordering::SeqCst);
    if remaining > 0 {
        state.flaky_remaining.store(remaining - 1, Ordering::SeqCst);
        return (StatusCode::SERVICE_UNAVAILABLE, "upstream busy").into_response();
    }
    Json(json!({"ok": true})).into_response()
}

async fn list_products(
    State(state): Shared,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !state.authorize(&headers) {
        return unauthorized();
    }
    *state.last_query.lock().unwrap() = query;
    Json(json!({
        "data": [{"id": 1, "name": "Milk"}, {"id": 2, "name": "Bread"}],
        "total_count": 41
    }))
    .into_response()
}

async fn create_product(State(state): Shared, headers: HeaderMap, Json(mut body): Json<Value>) -> Response {
    if !state.authorize(&headers) {
        return unauthorized();
    }
    if body["name"] == "Milk" {
        return (
            StatusCode::CONFLICT,
            Json(json!({"message": "Product already exists"})),
        )
            .into_response();
    }
    if body.get("name").is_none() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"detail": "name is required"})),
        )
            .into_response();
    }
    body["id"] = json!(3);
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn get_product(State(state): Shared, headers: HeaderMap, Path(id): Path<u64>) -> Response {
    if !state.authorize(&headers) {
        return unauthorized();
    }
    if id == 999 {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Product not found"})),
        )
            .into_response();
    }
    Json(json!({"id": id, "name": "Milk"})).into_response()
}

async fn update_product(
    State(state): Shared,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(mut body): Json<Value>,
) -> Response {
    if !state.authorize(&headers) {
        return unauthorized();
    }
    body["id"] = json!(id);
    Json(body).into_response()
}

async fn delete_product(State(state): Shared, headers: HeaderMap, Path(id): Path<u64>) -> Response {
    if !state.authorize(&headers) {
        return unauthorized();
    }
    if id == 999 {
        return (StatusCode::NOT_FOUND, "").into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn forbidden(State(state): Shared, headers: HeaderMap) -> Response {
    state.authorize(&headers);
    state.status_hits.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::FORBIDDEN,
        Json(json!({"message": "admins only"})),
    )
        .into_response()
}

/// Start the mock backend on an ephemeral loopback port.
pub async fn start_backend() -> MockBackend {
    let state = Arc::new(BackendState::default());

    let app = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/items/{id}", get(item))
        .route("/reject", get(reject))
        .route("/forbidden", any(forbidden))
        .route("/status/{code}", any(status))
        .route("/flaky", get(flaky))
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockBackend { addr, state }
}

/// Config pointed at `base_url` with fast retries.
pub fn test_config(base_url: &str) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.api.base_url = base_url.to_string();
    config.api.request_timeout_secs = 10;
    config.retries.base_delay_ms = 10;
    config.retries.max_delay_ms = 50;
    config.refresh.timeout_secs = 5;
    config
}

/// Client with an in-memory store already holding `{T1, R1}`.
pub fn logged_in_client(config: &ClientConfig) -> (ApiClient, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let client = ApiClient::new(config, store.clone()).unwrap();
    client
        .session()
        .replace(CredentialPair::new("T1", "R1"))
        .unwrap();
    (client, store)
}

/// Credential pair as currently persisted, if any.
pub fn stored_pair(store: &MemoryStore, config: &ClientConfig) -> Option<Value> {
    store
        .get(&config.session.key)
        .unwrap()
        .map(|raw| serde_json::from_str(&raw).unwrap())
}
