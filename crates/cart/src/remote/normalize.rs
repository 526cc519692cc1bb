//! Normalization of remote cart payloads.
//!
//! The remote API has shipped several response shapes over time. This module
//! is the only place that knows about them:
//!
//! - envelopes: bare list, `{data: {items: [...]}}`, `{items: [...]}`
//! - product id: `productId`, `product_id`, or `product.id`
//! - image: `product.image`, or the first entry of `product.images` (a string
//!   or an object with `url` / `src`)
//! - flags and vendor: `is_controlled` / `isControlled`, `vendor_id` / `vendorId`
//! - ids and prices: JSON numbers or strings
//!
//! Missing fields are left as `None`; defaults are applied when converting to
//! a [`CartLine`].

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;
use storefront_cart_core::{CartItem, CartItemId, CartLine, Price, ProductId, canonical_id};
use tracing::warn;

/// Canonical form of one remote cart item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedItem {
    /// Remote cart-item id.
    pub cart_item_id: Option<CartItemId>,
    /// Product id, from whichever field carried it.
    pub product_id: Option<ProductId>,
    /// Quantity as sent by the server.
    pub quantity: Option<i64>,
    /// Embedded product fields.
    pub product: NormalizedProduct,
}

/// Canonical form of the product embedded in a remote cart item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedProduct {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub image: Option<String>,
    pub sku: Option<String>,
    pub stock: Option<i64>,
    pub is_controlled: Option<bool>,
    pub vendor_id: Option<String>,
}

impl NormalizedItem {
    /// Whether this item is for the given product (string comparison of
    /// canonical ids).
    #[must_use]
    pub fn is_for(&self, product_id: &ProductId) -> bool {
        self.product_id.as_ref() == Some(product_id)
    }

    /// Convert to a local cart line, filling defaults.
    ///
    /// - name: `"Product #<id>"`
    /// - image: `placeholder_image`
    /// - price: 0
    /// - quantity: 1 (non-positive quantities map to 0, which the store drops)
    ///
    /// Returns `None` if the item has no product id.
    #[must_use]
    pub fn into_cart_line(self, placeholder_image: &str) -> Option<CartLine> {
        let id = self.product_id?;
        let product = self.product;

        let qty = self
            .quantity
            .map_or(1, |q| u32::try_from(q.max(0)).unwrap_or(u32::MAX));

        let item = CartItem {
            name: product
                .name
                .unwrap_or_else(|| format!("Product #{id}")),
            price: product.price.map_or(Price::ZERO, Price::new),
            image: Some(
                product
                    .image
                    .unwrap_or_else(|| placeholder_image.to_string()),
            ),
            sku: product.sku,
            stock: product.stock,
            is_controlled: product.is_controlled,
            vendor_id: product.vendor_id,
            id,
        };

        Some(CartLine::new(item, qty))
    }
}

/// Extract the item list from any known cart envelope.
///
/// Returns `None` when the payload matches no known shape.
#[must_use]
pub fn item_list(payload: &Value) -> Option<&[Value]> {
    if let Value::Array(items) = payload {
        return Some(items);
    }

    payload
        .get("data")
        .and_then(|data| data.get("items"))
        .or_else(|| payload.get("items"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
}

/// Normalize every item of a cart payload.
///
/// Entries that are not JSON objects are skipped. An unrecognized envelope
/// yields an empty list and a warning.
#[must_use]
pub fn normalize_items(payload: &Value) -> Vec<NormalizedItem> {
    let Some(items) = item_list(payload) else {
        warn!(
            payload = %truncate(&payload.to_string(), 200),
            "Unrecognized cart payload shape"
        );
        return Vec::new();
    };

    items.iter().filter_map(normalize_item).collect()
}

/// Normalize a single remote cart item.
#[must_use]
pub fn normalize_item(value: &Value) -> Option<NormalizedItem> {
    if !value.is_object() {
        return None;
    }

    let product = value.get("product");

    let product_id = ["productId", "product_id"]
        .iter()
        .filter_map(|key| value.get(*key))
        .chain(product.and_then(|p| p.get("id")))
        .find_map(ProductId::from_json);

    Some(NormalizedItem {
        cart_item_id: value.get("id").and_then(CartItemId::from_json),
        product_id,
        quantity: value.get("quantity").and_then(as_integer),
        product: product.map(normalize_product).unwrap_or_default(),
    })
}

fn normalize_product(product: &Value) -> NormalizedProduct {
    NormalizedProduct {
        name: product
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        price: product.get("price").and_then(as_decimal),
        image: product_image(product),
        sku: product.get("sku").and_then(canonical_id),
        stock: product.get("stock").and_then(as_integer),
        is_controlled: first_of(product, &["is_controlled", "isControlled"]).and_then(as_bool),
        vendor_id: first_of(product, &["vendor_id", "vendorId"]).and_then(canonical_id),
    }
}

fn product_image(product: &Value) -> Option<String> {
    let direct = product.get("image").and_then(image_url);
    direct.or_else(|| {
        product
            .get("images")
            .and_then(Value::as_array)
            .and_then(|images| images.first())
            .and_then(image_url)
    })
}

fn image_url(value: &Value) -> Option<String> {
    let url = match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(obj) => obj
            .get("url")
            .or_else(|| obj.get("src"))
            .and_then(Value::as_str),
        _ => None,
    }?;
    let url = url.trim();
    (!url.is_empty()).then(|| url.to_string())
}

fn first_of<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find(|v| !v.is_null())
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| {
                    #[allow(clippy::cast_possible_truncation)] // integral by the filter above
                    let whole = f as i64;
                    whole
                })
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        Value::String(s) => match s.trim() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
