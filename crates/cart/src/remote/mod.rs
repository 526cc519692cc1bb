//! Remote cart resource.
//!
//! # Architecture
//!
//! - [`CartApi`] is the contract the sync layer talks to: get / add / update
//!   / remove over HTTP-like request/response semantics
//! - [`HttpCartApi`] implements it with `reqwest`
//! - [`normalize`] turns whatever shape the server returns into canonical
//!   [`NormalizedItem`] records. All shape-guessing lives there.
//!
//! # Endpoints
//!
//! - `GET cart` - cart payload (bare list, `{data:{items}}` or `{items}`)
//! - `POST cart/add` - `{productId, quantity}`
//! - `PATCH cart/item/{cartItemId}` - `{quantity}`
//! - `DELETE cart/item/{cartItemId}`

mod http;
pub mod normalize;

use std::future::Future;

use storefront_cart_core::{CartItemId, ProductId};
use thiserror::Error;

pub use http::HttpCartApi;
pub use normalize::{NormalizedItem, NormalizedProduct, normalize_items};

/// Errors that can occur when talking to the remote cart API.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited by the API.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// An endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// The remote cart resource.
///
/// The remote API indexes mutations by an opaque cart-item id, not by
/// product id. Callers holding only a product id must resolve the cart-item
/// id from a fresh [`CartApi::get_cart`] first.
///
/// Futures are `Send` so operations can run on spawned tasks.
pub trait CartApi: Send + Sync + 'static {
    /// Fetch the raw cart payload.
    fn get_cart(&self) -> impl Future<Output = Result<serde_json::Value, RemoteError>> + Send;

    /// Add `quantity` units of a product.
    fn add(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Set the quantity of a remote cart item.
    fn update(
        &self,
        cart_item_id: &CartItemId,
        quantity: i64,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Remove a remote cart item.
    fn remove(
        &self,
        cart_item_id: &CartItemId,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display() {
        let err = RemoteError::Api {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 503 - unavailable");
    }

    #[test]
    fn test_rate_limited_error() {
        let err = RemoteError::RateLimited(60);
        assert_eq!(err.to_string(), "Rate limited, retry after 60 seconds");
    }
}
