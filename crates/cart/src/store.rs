//! Local cart store.
//!
//! The store is the authoritative in-memory picture of what the user intends
//! to buy, independent of network state. It is an explicit service object:
//! clone the handle into whatever needs it.
//!
//! State lives inside a `tokio::sync::watch` channel. Each mutation is a
//! single synchronous `send_if_modified` call, so mutations are atomic with
//! respect to each other and observers are notified before the call returns.
//! Mutations that change nothing do not wake observers.
//!
//! Holding a [`watch::Ref`] from [`CartStore::subscribe`] blocks mutations;
//! clone what you need and drop it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use indexmap::map::Entry;
use storefront_cart_core::{CartItem, CartLine, Price, ProductId};
use tokio::sync::watch;
use tracing::debug;

/// Immutable view of the cart at one point in time.
///
/// Lines are unique by product id and kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartSnapshot {
    lines: IndexMap<ProductId, CartLine>,
    hydrated_at: Option<DateTime<Utc>>,
}

impl CartSnapshot {
    /// Lines in insertion order.
    pub fn lines(&self) -> impl ExactSizeIterator<Item = &CartLine> {
        self.lines.values()
    }

    /// Look up a line by product id.
    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<&CartLine> {
        self.lines.get(id)
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of `price × qty` over all lines.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.lines.values().map(CartLine::line_total).sum()
    }

    /// Sum of `qty` over all lines.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.lines.values().map(|line| u64::from(line.qty)).sum()
    }

    /// When the cart was last replaced from the server.
    #[must_use]
    pub const fn hydrated_at(&self) -> Option<DateTime<Utc>> {
        self.hydrated_at
    }
}

/// Handle to the local cart store.
#[derive(Debug, Clone)]
pub struct CartStore {
    state: Arc<watch::Sender<CartSnapshot>>,
}

impl Default for CartStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CartStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(CartSnapshot::default());
        Self {
            state: Arc::new(state),
        }
    }

    /// Replace the entire collection.
    ///
    /// Never merges with prior contents. Within `items`, lines sharing a
    /// product id collapse into one with summed quantity, and zero-quantity
    /// lines are dropped.
    pub fn set_items(&self, items: impl IntoIterator<Item = CartLine>) {
        let mut lines: IndexMap<ProductId, CartLine> = IndexMap::new();
        for line in items.into_iter().filter(|line| line.qty > 0) {
            match lines.entry(line.id().clone()) {
                Entry::Occupied(mut existing) => {
                    let existing = existing.get_mut();
                    existing.qty = existing.qty.saturating_add(line.qty);
                }
                Entry::Vacant(slot) => {
                    slot.insert(line);
                }
            }
        }

        debug!(lines = lines.len(), "Replacing cart contents");
        self.state.send_modify(|cart| {
            cart.lines = lines;
            cart.hydrated_at = Some(Utc::now());
        });
    }

    /// Add `qty` units of an item.
    ///
    /// Repeated adds of the same product accumulate quantity on one line; the
    /// product fields of the existing line are kept. `qty == 0` is a no-op.
    pub fn add_item(&self, item: CartItem, qty: u32) {
        if qty == 0 {
            return;
        }
        self.state.send_modify(|cart| match cart.lines.entry(item.id.clone()) {
            Entry::Occupied(mut existing) => {
                let existing = existing.get_mut();
                existing.qty = existing.qty.saturating_add(qty);
            }
            Entry::Vacant(slot) => {
                slot.insert(CartLine::new(item, qty));
            }
        });
    }

    /// Set the quantity of a line.
    ///
    /// `qty <= 0` removes the line. No-op if the product is not in the cart.
    pub fn update_qty(&self, id: &ProductId, qty: i64) {
        if qty <= 0 {
            self.remove_item(id);
            return;
        }
        let qty = u32::try_from(qty).unwrap_or(u32::MAX);
        self.state.send_if_modified(|cart| match cart.lines.get_mut(id) {
            Some(line) if line.qty != qty => {
                line.qty = qty;
                true
            }
            _ => false,
        });
    }

    /// Remove a line. No-op if absent.
    pub fn remove_item(&self, id: &ProductId) {
        self.state
            .send_if_modified(|cart| cart.lines.shift_remove(id).is_some());
    }

    /// Remove every line.
    pub fn clear(&self) {
        self.state.send_if_modified(|cart| {
            if cart.lines.is_empty() {
                return false;
            }
            cart.lines.clear();
            true
        });
    }

    /// Sum of `price × qty` over current lines, recomputed on every call.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.state.borrow().subtotal()
    }

    /// Sum of `qty` over current lines, recomputed on every call.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.state.borrow().count()
    }

    /// Copy of the current lines, in insertion order.
    #[must_use]
    pub fn items(&self) -> Vec<CartLine> {
        self.state.borrow().lines().cloned().collect()
    }

    /// Copy of one line.
    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<CartLine> {
        self.state.borrow().get(id).cloned()
    }

    /// Whether the cart has a line for the product.
    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.state.borrow().get(id).is_some()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.borrow().len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.borrow().is_empty()
    }

    /// When the cart was last replaced from the server.
    #[must_use]
    pub fn last_hydrated_at(&self) -> Option<DateTime<Utc>> {
        self.state.borrow().hydrated_at()
    }

    /// Copy of the whole current state.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.state.borrow().clone()
    }

    /// Observe changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.state.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use super::*;

    fn bolt() -> CartItem {
        CartItem::new("7", "Bolt", 5_i64)
    }

    fn nut() -> CartItem {
        CartItem::new("8", "Nut", Price::from_cents(125))
    }

    #[test]
    fn test_add_merges_by_id() {
        let store = CartStore::new();
        store.add_item(bolt(), 2);
        assert_eq!(store.count(), 2);
        assert_eq!(store.subtotal(), Price::from(10_i64));

        store.add_item(bolt(), 1);
        assert_eq!(store.count(), 3);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_repeated_adds_sum_quantities() {
        let store = CartStore::new();
        let adds = [1_u32, 4, 2, 7, 1];
        for qty in adds {
            store.add_item(bolt(), qty);
        }
        let line = store.get(&ProductId::from("7")).unwrap();
        assert_eq!(line.qty, adds.iter().sum::<u32>());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_add_keeps_existing_product_fields() {
        let store = CartStore::new();
        store.add_item(bolt(), 1);
        store.add_item(CartItem::new("7", "Renamed", 99_i64), 1);
        let line = store.get(&ProductId::from("7")).unwrap();
        assert_eq!(line.item.name, "Bolt");
        assert_eq!(line.qty, 2);
    }

    #[test]
    fn test_add_zero_is_noop() {
        let store = CartStore::new();
        store.add_item(bolt(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_numeric_and_string_ids_share_a_line() {
        let store = CartStore::new();
        store.add_item(bolt(), 1);
        store.add_item(CartItem::new(7_u64, "Bolt", 5_i64), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_update_qty_sets_absolute_value() {
        let store = CartStore::new();
        store.add_item(bolt(), 2);
        store.update_qty(&ProductId::from("7"), 5);
        assert_eq!(store.count(), 5);
    }

    #[test]
    fn test_update_qty_zero_or_negative_removes() {
        for qty in [0, -1, -100] {
            let store = CartStore::new();
            store.add_item(bolt(), 2);
            store.add_item(nut(), 1);
            store.update_qty(&ProductId::from("7"), qty);
            assert!(store.get(&ProductId::from("7")).is_none());
            assert_eq!(store.len(), 1);
        }
    }

    #[test]
    fn test_update_qty_absent_is_noop() {
        let store = CartStore::new();
        store.add_item(bolt(), 2);
        store.update_qty(&ProductId::from("99"), 4);
        assert_eq!(store.items().len(), 1);
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_contains() {
        let store = CartStore::new();
        store.add_item(bolt(), 1);
        assert!(store.contains(&ProductId::from("7")));
        assert!(!store.contains(&ProductId::from("8")));
    }

    #[test]
    fn test_remove_item() {
        let store = CartStore::new();
        store.add_item(bolt(), 2);
        store.add_item(nut(), 1);
        store.remove_item(&ProductId::from("7"));
        store.remove_item(&ProductId::from("nope"));
        let ids: Vec<_> = store.items().into_iter().map(|l| l.item.id).collect();
        assert_eq!(ids, vec![ProductId::from("8")]);
    }

    #[test]
    fn test_aggregates_track_every_mutation() {
        let store = CartStore::new();
        assert_eq!(store.subtotal(), Price::ZERO);
        assert_eq!(store.count(), 0);

        store.add_item(bolt(), 2);
        store.add_item(nut(), 4);
        assert_eq!(store.subtotal().amount(), Decimal::from_str("15.00").unwrap());
        assert_eq!(store.count(), 6);

        store.update_qty(&ProductId::from("8"), 1);
        assert_eq!(store.subtotal().amount(), Decimal::from_str("11.25").unwrap());
        assert_eq!(store.count(), 3);

        store.remove_item(&ProductId::from("7"));
        assert_eq!(store.subtotal(), Price::from_cents(125));
        assert_eq!(store.count(), 1);

        store.clear();
        assert_eq!(store.subtotal(), Price::ZERO);
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_set_items_replaces_contents() {
        let store = CartStore::new();
        store.set_items([CartLine::new(bolt(), 1), CartLine::new(nut(), 1)]);
        store.set_items([CartLine::new(CartItem::new("9", "Washer", 1_i64), 3)]);

        let items = store.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id().as_str(), "9");
        assert!(store.last_hydrated_at().is_some());
    }

    #[test]
    fn test_set_items_collapses_duplicates_and_drops_zero() {
        let store = CartStore::new();
        store.set_items([
            CartLine::new(bolt(), 1),
            CartLine::new(nut(), 0),
            CartLine::new(bolt(), 2),
        ]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.count(), 3);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let store = CartStore::new();
        store.add_item(nut(), 1);
        store.add_item(bolt(), 1);
        store.add_item(nut(), 1);
        let ids: Vec<_> = store
            .items()
            .into_iter()
            .map(|l| l.item.id.to_string())
            .collect();
        assert_eq!(ids, vec!["8", "7"]);
    }

    #[test]
    fn test_observers_notified_only_on_change() {
        let store = CartStore::new();
        let mut rx = store.subscribe();
        assert!(!rx.has_changed().unwrap());

        store.add_item(bolt(), 1);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().count(), 1);

        store.remove_item(&ProductId::from("missing"));
        store.update_qty(&ProductId::from("7"), 1);
        assert!(!rx.has_changed().unwrap());

        store.clear();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_empty());

        store.clear();
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_clones_share_state() {
        let store = CartStore::new();
        let other = store.clone();
        other.add_item(bolt(), 2);
        assert_eq!(store.count(), 2);
    }
}
