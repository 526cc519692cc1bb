//! Newtype IDs for cart entities.
//!
//! Remote payloads carry ids as JSON numbers in some API versions and as
//! strings in others. Every id is canonicalized to its string form on the way
//! in, so `7`, `7.0` and `"7"` all compare equal.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally passing a cart-item id where a product id is expected.

use serde_json::Value;

/// Canonicalize a JSON id value to its string form.
///
/// Accepts strings (trimmed) and numbers. Integral floats lose their
/// fractional part (`7.0` becomes `"7"`). Returns `None` for null, booleans,
/// containers, and blank strings.
#[must_use]
pub fn canonical_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else {
                let f = n.as_f64()?;
                #[allow(clippy::cast_possible_truncation)] // guarded by the fract() check
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 {
                    Some((f as i64).to_string())
                } else {
                    Some(n.to_string())
                }
            }
        }
        _ => None,
    }
}

/// Macro to define a type-safe, string-backed ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize` as a plain string
/// - `Deserialize` from either a JSON string or a JSON number
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_str()`, `numeric()`, `from_json()`
/// - `From` implementations for `&str`, `String`, `u64`, `i64` and `u32`
///
/// # Example
///
/// ```rust
/// # use storefront_cart_core::define_id;
/// define_id!(WidgetId);
/// define_id!(GadgetId);
///
/// let widget = WidgetId::from(7_u64);
/// assert_eq!(widget.as_str(), "7");
///
/// // These are different types, so this won't compile:
/// // let _: GadgetId = widget;
/// ```
#[macro_export]
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, ::serde::Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value. Surrounding
            /// whitespace is trimmed.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                let id = id.into();
                let trimmed = id.trim();
                if trimmed.len() == id.len() {
                    Self(id)
                } else {
                    Self(trimmed.to_string())
                }
            }

            /// Canonicalize an id from a JSON string or number.
            #[must_use]
            pub fn from_json(value: &::serde_json::Value) -> Option<Self> {
                $crate::types::id::canonical_id(value).map(Self)
            }

            /// Get the canonical string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Parse the id as a numeric id, if it is one.
            #[must_use]
            pub fn numeric(&self) -> Option<u64> {
                self.0.parse::<u64>().ok()
            }

            /// Encode for a request body: a JSON number when numeric,
            /// otherwise a JSON string.
            #[must_use]
            pub fn to_wire(&self) -> ::serde_json::Value {
                self.numeric().map_or_else(
                    || ::serde_json::Value::String(self.0.clone()),
                    ::serde_json::Value::from,
                )
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.pad(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self::new(id)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id.to_string())
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id.to_string())
            }
        }

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                Self(id.to_string())
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::core::result::Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                let value =
                    <::serde_json::Value as ::serde::Deserialize>::deserialize(deserializer)?;
                Self::from_json(&value).ok_or_else(|| {
                    <D::Error as ::serde::de::Error>::custom(format!(
                        "invalid {}: expected a string or number, got {value}",
                        stringify!($name)
                    ))
                })
            }
        }
    };
}

define_id!(
    /// Product identifier, used as the key of the local cart.
    ProductId
);
define_id!(
    /// Remote cart-item identifier, distinct from the product id.
    ///
    /// Required for update and remove calls; never retained locally.
    CartItemId
);
