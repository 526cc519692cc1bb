//! Best-effort synchronization between the local store and the remote cart.
//!
//! Local state is the source of truth for rendering. Every operation here
//! is fire-and-forget: failures are logged and swallowed, never returned,
//! and nothing is retried or rolled back. The server cart eventually
//! reflects the user's intent, best-effort.
//!
//! The remote API indexes mutations by cart-item id. That id is never kept
//! locally; update and remove re-derive it by scanning a fresh copy of the
//! remote cart ([`CartSync::resolve_remote_item_id`]).

pub mod sequencer;

use storefront_cart_core::{CartItemId, ProductId};
use tracing::{debug, info, instrument, warn};

use crate::config::DEFAULT_PLACEHOLDER_IMAGE;
use crate::remote::{CartApi, NormalizedItem, RemoteError, normalize_items};
use crate::store::CartStore;

pub use sequencer::{Sequencer, Ticket, Turn};

/// Bridge between a [`CartStore`] and a remote [`CartApi`].
#[derive(Debug)]
pub struct CartSync<A> {
    api: A,
    store: CartStore,
    placeholder_image: String,
}

impl<A: CartApi> CartSync<A> {
    /// Create a coordinator for `store` backed by `api`.
    pub fn new(api: A, store: CartStore) -> Self {
        Self {
            api,
            store,
            placeholder_image: DEFAULT_PLACEHOLDER_IMAGE.to_string(),
        }
    }

    /// Use a different image for hydrated lines that carry none.
    #[must_use]
    pub fn with_placeholder_image(mut self, image: impl Into<String>) -> Self {
        self.placeholder_image = image.into();
        self
    }

    /// The remote API.
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// The local store.
    pub const fn store(&self) -> &CartStore {
        &self.store
    }

    async fn fetch_items(&self) -> Result<Vec<NormalizedItem>, RemoteError> {
        let payload = self.api.get_cart().await?;
        Ok(normalize_items(&payload))
    }

    /// Find the remote cart-item id for a product.
    ///
    /// Fetches the full remote cart on every call. Returns `None` (with a
    /// warning) when no remote item matches or the fetch fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn resolve_remote_item_id(&self, product_id: &ProductId) -> Option<CartItemId> {
        let items = match self.fetch_items().await {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "Failed to fetch remote cart for item lookup");
                return None;
            }
        };

        let found = items
            .into_iter()
            .find(|item| item.is_for(product_id))
            .and_then(|item| item.cart_item_id);

        if found.is_none() {
            warn!("No remote cart item for product");
        }
        found
    }

    /// Push an add to the server.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn sync_add(&self, product_id: &ProductId, quantity: u32) {
        if let Err(e) = self.api.add(product_id, quantity).await {
            warn!(error = %e, "Failed to sync cart add");
        }
    }

    /// Push a quantity change to the server.
    ///
    /// Falls back to an add when the server has no item for the product and
    /// `quantity > 0`, healing a line that was never pushed.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn sync_update_qty(&self, product_id: &ProductId, quantity: i64) {
        let result = match self.resolve_remote_item_id(product_id).await {
            Some(cart_item_id) => self.api.update(&cart_item_id, quantity).await,
            None if quantity > 0 => {
                debug!("Falling back to add for unsynced line");
                let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
                self.api.add(product_id, quantity).await
            }
            None => Ok(()),
        };

        if let Err(e) = result {
            warn!(error = %e, "Failed to sync cart quantity");
        }
    }

    /// Push a removal to the server.
    ///
    /// Does nothing if the server has no item for the product.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn sync_remove(&self, product_id: &ProductId) {
        let Some(cart_item_id) = self.resolve_remote_item_id(product_id).await else {
            warn!("Cannot remove product the server does not know about");
            return;
        };

        if let Err(e) = self.api.remove(&cart_item_id).await {
            warn!(error = %e, "Failed to sync cart removal");
        }
    }

    /// Replace the local cart with the server's.
    ///
    /// An authoritative overwrite, not a merge. On failure the local cart is
    /// left untouched. Returns whether the local cart was replaced.
    #[instrument(skip(self))]
    pub async fn hydrate_from_server(&self) -> bool {
        let items = match self.fetch_items().await {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "Failed to hydrate cart from server");
                return false;
            }
        };

        let remote_count = items.len();
        let lines: Vec<_> = items
            .into_iter()
            .filter_map(|item| {
                let cart_item_id = item.cart_item_id.clone();
                let line = item.into_cart_line(&self.placeholder_image);
                if line.is_none() {
                    warn!(
                        cart_item_id = ?cart_item_id,
                        "Skipping remote cart item without product id"
                    );
                }
                line
            })
            .collect();

        info!(remote_items = remote_count, lines = lines.len(), "Hydrated cart from server");
        self.store.set_items(lines);
        true
    }

    /// Upload every local line as an add.
    ///
    /// Used to migrate a guest cart after login. Lines whose id is not a
    /// numeric product id are skipped. There is no idempotency guard: calling
    /// this twice adds everything twice. Returns how many adds succeeded.
    #[instrument(skip(self))]
    pub async fn push_local_cart_to_server(&self) -> usize {
        let lines = self.store.items();
        let mut pushed = 0;

        for line in &lines {
            if line.id().numeric().is_none() {
                debug!(product_id = %line.id(), "Skipping line with non-numeric product id");
                continue;
            }
            match self.api.add(line.id(), line.qty).await {
                Ok(()) => pushed += 1,
                Err(e) => {
                    warn!(product_id = %line.id(), error = %e, "Failed to push cart line");
                }
            }
        }

        info!(lines = lines.len(), pushed, "Pushed local cart to server");
        pushed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;
    use storefront_cart_core::{CartItem, CartLine, Price};

    use super::*;
    use crate::testing::{ApiCall, RecordingApi};

    fn sync_with(cart: serde_json::Value) -> CartSync<RecordingApi> {
        CartSync::new(RecordingApi::with_cart(cart), CartStore::new())
    }

    #[tokio::test]
    async fn test_resolve_across_id_shapes() {
        let sync = sync_with(json!({"items": [
            {"id": 10, "productId": 5},
            {"id": 11, "product_id": 7},
            {"id": 12, "product": {"id": 9}}
        ]}));

        assert_eq!(
            sync.resolve_remote_item_id(&ProductId::from("7")).await,
            Some(CartItemId::from("11"))
        );
        assert_eq!(
            sync.resolve_remote_item_id(&ProductId::from("9")).await,
            Some(CartItemId::from("12"))
        );
        assert_eq!(sync.resolve_remote_item_id(&ProductId::from("99")).await, None);
    }

    #[tokio::test]
    async fn test_resolve_fetches_every_time() {
        let sync = sync_with(json!([{"id": 1, "productId": 7}]));
        sync.resolve_remote_item_id(&ProductId::from("7")).await;
        sync.resolve_remote_item_id(&ProductId::from("7")).await;
        assert_eq!(sync.api().calls(), vec![ApiCall::GetCart, ApiCall::GetCart]);
    }

    #[tokio::test]
    async fn test_resolve_swallows_fetch_failure() {
        let sync = sync_with(json!([{"id": 1, "productId": 7}]));
        sync.api().fail_get();
        assert_eq!(sync.resolve_remote_item_id(&ProductId::from("7")).await, None);
    }

    #[tokio::test]
    async fn test_sync_add_swallows_failure() {
        let sync = sync_with(json!([]));
        sync.api().fail_mutations();
        sync.sync_add(&ProductId::from("7"), 2).await;
        assert_eq!(sync.api().calls(), vec![ApiCall::Add(ProductId::from("7"), 2)]);
    }

    #[tokio::test]
    async fn test_sync_update_found() {
        let sync = sync_with(json!({
            "data": {"items": [{"id": 31, "productId": 7, "quantity": 1}]}
        }));
        sync.sync_update_qty(&ProductId::from("7"), 4).await;
        assert_eq!(
            sync.api().mutations(),
            vec![ApiCall::Update(CartItemId::from("31"), 4)]
        );
    }

    #[tokio::test]
    async fn test_sync_update_missing_falls_back_to_add() {
        let sync = sync_with(json!([]));
        sync.sync_update_qty(&ProductId::from("7"), 3).await;
        assert_eq!(sync.api().mutations(), vec![ApiCall::Add(ProductId::from("7"), 3)]);
    }

    #[tokio::test]
    async fn test_sync_update_missing_with_zero_does_nothing() {
        let sync = sync_with(json!([]));
        sync.sync_update_qty(&ProductId::from("7"), 0).await;
        assert!(sync.api().mutations().is_empty());
    }

    #[tokio::test]
    async fn test_sync_remove_found() {
        let sync = sync_with(json!([{"id": "ci-7", "product_id": "7"}]));
        sync.sync_remove(&ProductId::from("7")).await;
        assert_eq!(
            sync.api().mutations(),
            vec![ApiCall::Remove(CartItemId::from("ci-7"))]
        );
    }

    #[tokio::test]
    async fn test_sync_remove_unknown_never_deletes() {
        let sync = sync_with(json!([{"id": 1, "productId": 7}]));
        sync.sync_remove(&ProductId::from("99")).await;
        assert!(sync.api().mutations().is_empty());
    }

    #[tokio::test]
    async fn test_hydrate_maps_remote_items() {
        let sync = sync_with(json!({"data": {"items": [
            {"id": 1, "productId": 7, "quantity": 2, "product": {"name": "Bolt", "price": 5}}
        ]}}));

        assert!(sync.hydrate_from_server().await);

        let items = sync.store().items();
        assert_eq!(items.len(), 1);
        let line = &items[0];
        assert_eq!(line.id().as_str(), "7");
        assert_eq!(line.item.name, "Bolt");
        assert_eq!(line.item.price, Price::from(5_i64));
        assert_eq!(line.qty, 2);
    }

    #[tokio::test]
    async fn test_hydrate_extreme_price_keeps_totals_finite() {
        let sync = sync_with(json!([{
            "id": 1,
            "productId": 7,
            "quantity": 2,
            "product": {"price": "79228162514264337593543950335"}
        }]));

        assert!(sync.hydrate_from_server().await);

        assert_eq!(sync.store().count(), 2);
        assert_eq!(sync.store().subtotal().amount(), Decimal::MAX);
        let line = sync.store().get(&ProductId::from("7")).unwrap();
        assert_eq!(line.line_total().amount(), Decimal::MAX);
    }

    #[tokio::test]
    async fn test_hydrate_overwrites_local_state() {
        let sync = sync_with(json!([{"id": 1, "productId": 9, "product": {"name": "Washer"}}]));
        sync.store().add_item(CartItem::new("7", "Bolt", 5_i64), 2);

        sync.hydrate_from_server().await;

        let ids: Vec<_> = sync.store().items().into_iter().map(|l| l.item.id).collect();
        assert_eq!(ids, vec![ProductId::from("9")]);
    }

    #[tokio::test]
    async fn test_hydrate_applies_defaults_and_skips_unkeyed() {
        let sync = sync_with(json!([
            {"id": 1, "product_id": 12},
            {"id": 2, "quantity": 4},
            {"id": 3, "productId": 13, "quantity": 0}
        ]))
        .with_placeholder_image("/none.svg");

        sync.hydrate_from_server().await;

        let items = sync.store().items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item.name, "Product #12");
        assert_eq!(items[0].item.image.as_deref(), Some("/none.svg"));
        assert_eq!(items[0].item.price, Price::ZERO);
        assert_eq!(items[0].qty, 1);
    }

    #[tokio::test]
    async fn test_hydrate_failure_keeps_local_state() {
        let sync = sync_with(json!([]));
        sync.store().add_item(CartItem::new("7", "Bolt", 5_i64), 2);
        sync.api().fail_get();

        assert!(!sync.hydrate_from_server().await);
        assert_eq!(sync.store().count(), 2);
        assert!(sync.store().last_hydrated_at().is_none());
    }

    #[tokio::test]
    async fn test_push_skips_non_numeric_ids() {
        let sync = sync_with(json!([]));
        sync.store().set_items([
            CartLine::new(CartItem::new("7", "Bolt", 5_i64), 2),
            CartLine::new(CartItem::new("gift-card", "Gift card", 25_i64), 1),
            CartLine::new(CartItem::new("8", "Nut", 1_i64), 3),
        ]);

        assert_eq!(sync.push_local_cart_to_server().await, 2);
        assert_eq!(
            sync.api().calls(),
            vec![
                ApiCall::Add(ProductId::from("7"), 2),
                ApiCall::Add(ProductId::from("8"), 3)
            ]
        );
    }

    #[tokio::test]
    async fn test_push_twice_adds_twice() {
        let sync = sync_with(json!([]));
        sync.store().add_item(CartItem::new("7", "Bolt", 5_i64), 1);
        sync.push_local_cart_to_server().await;
        sync.push_local_cart_to_server().await;
        assert_eq!(sync.api().mutations().len(), 2);
    }

    #[tokio::test]
    async fn test_push_counts_only_successes() {
        let sync = sync_with(json!([]));
        sync.store().add_item(CartItem::new("7", "Bolt", 5_i64), 1);
        sync.api().fail_mutations();
        assert_eq!(sync.push_local_cart_to_server().await, 0);
        assert_eq!(sync.store().count(), 1);
    }
}
