//! `reqwest` client for the remote cart API.

use std::sync::Arc;

use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use storefront_cart_core::{CartItemId, ProductId};
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use super::{CartApi, RemoteError};
use crate::config::RemoteApiConfig;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Maximum number of body characters kept in errors and logs.
const BODY_SNIPPET_LEN: usize = 200;

/// Client for the remote cart API.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct HttpCartApi {
    inner: Arc<HttpCartApiInner>,
}

struct HttpCartApiInner {
    client: reqwest::Client,
    base_url: Url,
    access_token: Option<SecretString>,
}

impl std::fmt::Debug for HttpCartApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCartApi")
            .field("base_url", &self.inner.base_url.as_str())
            .field(
                "access_token",
                &self.inner.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl HttpCartApi {
    /// Create a new cart API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &RemoteApiConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        // Endpoints are joined relative to the base, which needs a trailing
        // slash or `join` would replace its last segment
        let mut base_url = config.base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            inner: Arc::new(HttpCartApiInner {
                client,
                base_url,
                access_token: config.access_token.clone(),
            }),
        })
    }

    /// The normalized base URL all endpoints are relative to.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        Ok(self.inner.base_url.join(path)?)
    }

    fn item_endpoint(&self, cart_item_id: &CartItemId) -> Result<Url, RemoteError> {
        let mut url = self.endpoint("cart/item/")?;
        url.path_segments_mut()
            .map_err(|()| {
                RemoteError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase)
            })?
            .pop_if_empty()
            .push(cart_item_id.as_str());
        Ok(url)
    }

    /// Send a request and return the response body on success.
    async fn send(&self, request: RequestBuilder) -> Result<String, RemoteError> {
        let request_id = Uuid::new_v4().to_string();
        let mut request = request.header(REQUEST_ID_HEADER, &request_id);
        if let Some(token) = &self.inner.access_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(RemoteError::RateLimited(retry_after));
        }

        let body = response.text().await?;

        if !status.is_success() {
            debug!(
                status = %status,
                request_id = %request_id,
                body = %body.chars().take(BODY_SNIPPET_LEN).collect::<String>(),
                "Cart API returned non-success status"
            );
            return Err(RemoteError::Api {
                status: status.as_u16(),
                message: body.chars().take(BODY_SNIPPET_LEN).collect(),
            });
        }

        debug!(status = %status, request_id = %request_id, "Cart API request succeeded");
        Ok(body)
    }
}

impl CartApi for HttpCartApi {
    #[instrument(skip(self))]
    async fn get_cart(&self) -> Result<Value, RemoteError> {
        let url = self.endpoint("cart")?;
        let body = self.send(self.inner.client.get(url)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn add(&self, product_id: &ProductId, quantity: u32) -> Result<(), RemoteError> {
        let url = self.endpoint("cart/add")?;
        let body = json!({
            "productId": product_id.to_wire(),
            "quantity": quantity,
        });
        self.send(self.inner.client.post(url).json(&body)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(cart_item_id = %cart_item_id))]
    async fn update(&self, cart_item_id: &CartItemId, quantity: i64) -> Result<(), RemoteError> {
        let url = self.item_endpoint(cart_item_id)?;
        let body = json!({ "quantity": quantity });
        self.send(self.inner.client.patch(url).json(&body)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(cart_item_id = %cart_item_id))]
    async fn remove(&self, cart_item_id: &CartItemId) -> Result<(), RemoteError> {
        let url = self.item_endpoint(cart_item_id)?;
        self.send(self.inner.client.delete(url)).await?;
        Ok(())
    }
}
