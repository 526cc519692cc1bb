//! Storefront cart library.
//!
//! A local, optimistic cart cache kept eventually consistent with a remote
//! authoritative cart.
//!
//! # Architecture
//!
//! - [`store`] - In-memory cart keyed by product id; synchronous mutations
//!   and derived totals
//! - [`remote`] - The remote cart API contract, its `reqwest` client, and the
//!   tolerant payload normalization
//! - [`sync`] - Fire-and-forget bridge: hydrate, push, resolve cart-item ids
//! - [`service`] - What UI code holds: local mutation plus background sync
//! - [`auth`] - Hydrate on login, migrate guest carts, clear on logout
//!
//! # Example
//!
//! ```rust,ignore
//! use storefront_cart::{CartConfig, CartService, auth};
//! use storefront_cart_core::CartItem;
//!
//! let config = CartConfig::from_env()?;
//! let (auth_tx, auth_rx) = tokio::sync::watch::channel(false);
//! let cart = CartService::from_config(&config, auth_rx.clone())?;
//! auth::spawn_auth_watcher(cart.clone(), auth_rx);
//!
//! cart.add_item(CartItem::new("7", "Bolt", 5_i64), 2);
//! assert_eq!(cart.store().count(), 2);
//!
//! // Logging in hydrates the cart from the server
//! auth_tx.send(true)?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod config;
pub mod error;
pub mod remote;
pub mod service;
pub mod store;
pub mod sync;

#[cfg(test)]
mod testing;

pub use config::{CartConfig, ConfigError, RemoteApiConfig};
pub use error::CartError;
pub use remote::{CartApi, HttpCartApi, RemoteError};
pub use service::CartService;
pub use store::{CartSnapshot, CartStore};
pub use sync::CartSync;
