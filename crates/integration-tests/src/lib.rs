//! In-process fake of the remote cart API.
//!
//! [`FakeCartServer`] binds an `axum` router on an ephemeral localhost port
//! and serves the four cart endpoints from shared in-memory state. Every
//! request is recorded so tests can assert on exactly what went over the
//! wire.
//!
//! ```rust,ignore
//! let server = FakeCartServer::start().await?;
//! server.seed(vec![json!({"id": 1, "productId": 7, "quantity": 2})]);
//! let api = HttpCartApi::new(&server.api_config())?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use secrecy::SecretString;
use serde_json::{Value, json};
use storefront_cart::RemoteApiConfig;
use storefront_cart_core::canonical_id;
use tokio::task::JoinHandle;
use url::Url;

/// Bearer token the default client config sends.
pub const TEST_TOKEN: &str = "test-token";

/// How the fake wraps the item list in `GET /api/cart`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// `[...]`
    Bare,
    /// `{"items": [...]}`
    Items,
    /// `{"data": {"items": [...]}}`
    Data,
}

/// One request as the fake saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
    pub authorization: Option<String>,
    pub request_id: Option<String>,
}

struct FakeState {
    items: Vec<Value>,
    next_id: u64,
    envelope: Envelope,
    failure: Option<StatusCode>,
    requests: Vec<RecordedRequest>,
}

type SharedState = Arc<Mutex<FakeState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, FakeState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A running fake cart API. The server task is aborted on drop.
pub struct FakeCartServer {
    addr: SocketAddr,
    state: SharedState,
    task: JoinHandle<()>,
}

impl FakeCartServer {
    /// Bind to an ephemeral port and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> std::io::Result<Self> {
        let state = Arc::new(Mutex::new(FakeState {
            items: Vec::new(),
            next_id: 1000,
            envelope: Envelope::Items,
            failure: None,
            requests: Vec::new(),
        }));

        let app = Router::new()
            .route("/api/cart", get(get_cart))
            .route("/api/cart/add", post(add_item))
            .route("/api/cart/item/{id}", patch(update_item).delete(remove_item))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self { addr, state, task })
    }

    /// Base URL of the API, without a trailing slash.
    ///
    /// # Panics
    ///
    /// Panics if the bound address does not form a valid URL.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}/api", self.addr)).expect("socket address forms a valid URL")
    }

    /// Client config pointing at this server with [`TEST_TOKEN`].
    #[must_use]
    pub fn api_config(&self) -> RemoteApiConfig {
        RemoteApiConfig {
            base_url: self.base_url(),
            access_token: Some(SecretString::from(TEST_TOKEN)),
            timeout: Duration::from_secs(5),
        }
    }

    /// Replace the server cart with raw item payloads.
    pub fn seed(&self, items: Vec<Value>) {
        lock(&self.state).items = items;
    }

    /// Choose how `GET /api/cart` wraps its items.
    pub fn set_envelope(&self, envelope: Envelope) {
        lock(&self.state).envelope = envelope;
    }

    /// Answer every request with `status` until cleared with `None`.
    pub fn fail_with(&self, status: Option<StatusCode>) {
        lock(&self.state).failure = status;
    }

    /// Current server cart items.
    #[must_use]
    pub fn items(&self) -> Vec<Value> {
        lock(&self.state).items.clone()
    }

    /// Quantity the server holds for a product, if it has an item for it.
    #[must_use]
    pub fn quantity_of(&self, product_id: &str) -> Option<i64> {
        lock(&self.state)
            .items
            .iter()
            .find(|item| item_product_id(item).as_deref() == Some(product_id))
            .and_then(|item| item.get("quantity").and_then(Value::as_i64))
    }

    /// Every request received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }

    /// Requests other than `GET`, in arrival order.
    #[must_use]
    pub fn mutations(&self) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method != "GET")
            .collect()
    }
}

impl Drop for FakeCartServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn item_product_id(item: &Value) -> Option<String> {
    ["productId", "product_id"]
        .iter()
        .find_map(|key| item.get(*key).and_then(canonical_id))
        .or_else(|| item.pointer("/product/id").and_then(canonical_id))
}

fn item_id(item: &Value) -> Option<String> {
    item.get("id").and_then(canonical_id)
}

fn header_value(headers: &HeaderMap, name: impl header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Record the request and return the configured failure, if any.
fn record(
    state: &mut FakeState,
    method: &'static str,
    path: String,
    headers: &HeaderMap,
    body: Option<Value>,
) -> Option<Response> {
    state.requests.push(RecordedRequest {
        method,
        path,
        body,
        authorization: header_value(headers, header::AUTHORIZATION),
        request_id: header_value(headers, "x-request-id"),
    });

    let status = state.failure?;
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Some((status, [(header::RETRY_AFTER, "3")], "slow down").into_response());
    }
    Some((status, "fake failure").into_response())
}

async fn get_cart(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let mut state = lock(&state);
    if let Some(failure) = record(&mut state, "GET", "/api/cart".to_string(), &headers, None) {
        return failure;
    }

    let items = Value::Array(state.items.clone());
    let payload = match state.envelope {
        Envelope::Bare => items,
        Envelope::Items => json!({ "items": items }),
        Envelope::Data => json!({ "data": { "items": items } }),
    };
    Json(payload).into_response()
}

async fn add_item(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    let path = "/api/cart/add".to_string();
    if let Some(failure) = record(&mut state, "POST", path, &headers, Some(body.clone())) {
        return failure;
    }

    let Some(product_id) = body.get("productId").and_then(canonical_id) else {
        return (StatusCode::UNPROCESSABLE_ENTITY, "productId required").into_response();
    };
    let quantity = body.get("quantity").and_then(Value::as_i64).unwrap_or(1);

    let existing = state
        .items
        .iter_mut()
        .find(|item| item_product_id(item).as_deref() == Some(product_id.as_str()));
    if let Some(item) = existing {
        let current = item.get("quantity").and_then(Value::as_i64).unwrap_or(0);
        item["quantity"] = json!(current + quantity);
        return Json(item.clone()).into_response();
    }

    let id = state.next_id;
    state.next_id += 1;
    let item = json!({
        "id": id,
        "productId": body["productId"].clone(),
        "quantity": quantity,
        "product": { "name": format!("Server product {product_id}"), "price": "1.00" },
    });
    state.items.push(item.clone());
    (StatusCode::CREATED, Json(item)).into_response()
}

async fn update_item(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    let path = format!("/api/cart/item/{id}");
    if let Some(failure) = record(&mut state, "PATCH", path, &headers, Some(body.clone())) {
        return failure;
    }

    let Some(quantity) = body.get("quantity").and_then(Value::as_i64) else {
        return (StatusCode::UNPROCESSABLE_ENTITY, "quantity required").into_response();
    };
    match state
        .items
        .iter_mut()
        .find(|item| item_id(item).as_deref() == Some(id.as_str()))
    {
        Some(item) => {
            item["quantity"] = json!(quantity);
            Json(item.clone()).into_response()
        }
        None => (StatusCode::NOT_FOUND, "no such cart item").into_response(),
    }
}

async fn remove_item(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut state = lock(&state);
    let path = format!("/api/cart/item/{id}");
    if let Some(failure) = record(&mut state, "DELETE", path, &headers, None) {
        return failure;
    }

    let before = state.items.len();
    state
        .items
        .retain(|item| item_id(item).as_deref() != Some(id.as_str()));
    if state.items.len() == before {
        return (StatusCode::NOT_FOUND, "no such cart item").into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}
