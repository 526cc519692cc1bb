//! Core cart types.
//!
//! This module provides type-safe wrappers for the cart domain.

pub mod id;
pub mod line;
pub mod price;

pub use id::{CartItemId, ProductId, canonical_id};
pub use line::{CartItem, CartLine};
pub use price::Price;
