//! Local cart line types.

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// Product snapshot carried by a cart line.
///
/// This is everything the UI needs to render a line without refetching the
/// product. It is the input to [`CartLine`] creation on add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Product id (canonical string form).
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: Price,
    /// Image URL or path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Stock keeping unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    /// Units in stock, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    /// Whether the product is a controlled item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_controlled: Option<bool>,
    /// Seller that lists the product.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
}

impl CartItem {
    /// Create an item with only the required fields set.
    #[must_use]
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: impl Into<Price>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price: price.into(),
            image: None,
            sku: None,
            stock: None,
            is_controlled: None,
            vendor_id: None,
        }
    }
}

/// One line of the local cart: a product and the quantity the user intends
/// to buy.
///
/// Serializes flat, e.g. `{"id":"7","name":"Bolt","price":"5","qty":2}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// The product on this line.
    #[serde(flatten)]
    pub item: CartItem,
    /// Quantity, always at least 1 while the line is in a cart.
    pub qty: u32,
}

impl CartLine {
    /// Create a line.
    #[must_use]
    pub const fn new(item: CartItem, qty: u32) -> Self {
        Self { item, qty }
    }

    /// The product id keying this line.
    #[must_use]
    pub const fn id(&self) -> &ProductId {
        &self.item.id
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.item.price.times(self.qty)
    }
}
