//! In-memory [`CartApi`] used by unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use storefront_cart_core::{CartItemId, ProductId};

use crate::remote::{CartApi, RemoteError};

/// A call the fake received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    GetCart,
    Add(ProductId, u32),
    Update(CartItemId, i64),
    Remove(CartItemId),
}

/// Records calls and answers `get_cart` with a canned payload.
#[derive(Debug, Clone, Default)]
pub struct RecordingApi {
    inner: Arc<Mutex<RecordingState>>,
}

#[derive(Debug, Default)]
struct RecordingState {
    cart: Value,
    fail_get: bool,
    fail_mutations: bool,
    delay: Option<Duration>,
    calls: Vec<ApiCall>,
}

#[allow(clippy::unwrap_used)]
impl RecordingApi {
    pub fn with_cart(cart: Value) -> Self {
        let api = Self::default();
        api.inner.lock().unwrap().cart = cart;
        api
    }

    pub fn set_cart(&self, cart: Value) {
        self.inner.lock().unwrap().cart = cart;
    }

    pub fn fail_get(&self) {
        self.inner.lock().unwrap().fail_get = true;
    }

    pub fn fail_mutations(&self) {
        self.inner.lock().unwrap().fail_mutations = true;
    }

    pub fn delay(&self, delay: Duration) {
        self.inner.lock().unwrap().delay = Some(delay);
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Calls other than `GetCart`.
    pub fn mutations(&self) -> Vec<ApiCall> {
        self.calls()
            .into_iter()
            .filter(|c| *c != ApiCall::GetCart)
            .collect()
    }

    async fn record(&self, call: ApiCall) -> Result<(), RemoteError> {
        let (delay, fail) = {
            let mut state = self.inner.lock().unwrap();
            let fail = match call {
                ApiCall::GetCart => state.fail_get,
                _ => state.fail_mutations,
            };
            state.calls.push(call);
            (state.delay, fail)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(RemoteError::Api {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[allow(clippy::unwrap_used)]
impl CartApi for RecordingApi {
    async fn get_cart(&self) -> Result<Value, RemoteError> {
        self.record(ApiCall::GetCart).await?;
        Ok(self.inner.lock().unwrap().cart.clone())
    }

    async fn add(&self, product_id: &ProductId, quantity: u32) -> Result<(), RemoteError> {
        self.record(ApiCall::Add(product_id.clone(), quantity)).await
    }

    async fn update(&self, cart_item_id: &CartItemId, quantity: i64) -> Result<(), RemoteError> {
        self.record(ApiCall::Update(cart_item_id.clone(), quantity))
            .await
    }

    async fn remove(&self, cart_item_id: &CartItemId) -> Result<(), RemoteError> {
        self.record(ApiCall::Remove(cart_item_id.clone())).await
    }
}
