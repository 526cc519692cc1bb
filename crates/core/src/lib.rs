//! Storefront Cart Core - Shared types library.
//!
//! This crate provides the types shared by the cart components:
//! - `cart` - Local cart store and remote cart synchronization
//! - `cli` - Command-line driver for the remote cart API
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. This keeps
//! it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for product ids, cart-item ids, prices and
//!   cart lines

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
