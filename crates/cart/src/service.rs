//! Cart service shared with UI code.
//!
//! Mutations apply to the local store synchronously and then, when the user
//! is authenticated, schedule the matching sync operation in the background.
//! Guest carts stay local until login (see [`crate::auth`]).

use std::future::Future;
use std::sync::Arc;

use storefront_cart_core::{CartItem, ProductId};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::CartConfig;
use crate::error::CartError;
use crate::remote::{CartApi, HttpCartApi};
use crate::store::CartStore;
use crate::sync::{CartSync, Sequencer};

/// Cart service.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// local store and the sync coordinator.
pub struct CartService<A> {
    inner: Arc<CartServiceInner<A>>,
}

impl<A> Clone for CartService<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct CartServiceInner<A> {
    sync: CartSync<A>,
    sequencer: Sequencer,
    auth: watch::Receiver<bool>,
}

impl CartService<HttpCartApi> {
    /// Build a service talking to the configured remote cart API.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(
        config: &CartConfig,
        auth: watch::Receiver<bool>,
    ) -> Result<Self, CartError> {
        let api = HttpCartApi::new(&config.api)?;
        let sync = CartSync::new(api, CartStore::new())
            .with_placeholder_image(config.placeholder_image.clone());
        Ok(Self::with_sync(sync, auth))
    }
}

impl<A: CartApi> CartService<A> {
    /// Create a service over `api` with a fresh store.
    pub fn new(api: A, auth: watch::Receiver<bool>) -> Self {
        Self::with_sync(CartSync::new(api, CartStore::new()), auth)
    }

    /// Create a service around an existing coordinator.
    pub fn with_sync(sync: CartSync<A>, auth: watch::Receiver<bool>) -> Self {
        Self {
            inner: Arc::new(CartServiceInner {
                sync,
                sequencer: Sequencer::new(),
                auth,
            }),
        }
    }

    /// The local store.
    #[must_use]
    pub fn store(&self) -> &CartStore {
        self.inner.sync.store()
    }

    /// The sync coordinator.
    #[must_use]
    pub fn sync(&self) -> &CartSync<A> {
        &self.inner.sync
    }

    /// Current value of the authentication signal.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        *self.inner.auth.borrow()
    }

    /// A fresh receiver for the authentication signal.
    #[must_use]
    pub fn auth(&self) -> watch::Receiver<bool> {
        self.inner.auth.clone()
    }

    /// Add `qty` units of an item, then sync the add.
    pub fn add_item(&self, item: CartItem, qty: u32) -> Option<JoinHandle<()>> {
        let id = item.id.clone();
        self.store().add_item(item, qty);
        if qty == 0 {
            return None;
        }
        self.spawn_sync(id, move |sync, id| async move {
            sync.sync_add(&id, qty).await;
        })
    }

    /// Set a line's quantity (`qty <= 0` removes it), then sync the change.
    ///
    /// Nothing is synced when the product is not in the local cart.
    pub fn update_qty(&self, id: &ProductId, qty: i64) -> Option<JoinHandle<()>> {
        if !self.store().contains(id) {
            debug!(product_id = %id, "Quantity change for product not in cart");
            return None;
        }
        self.store().update_qty(id, qty);
        if qty <= 0 {
            return self.spawn_sync(id.clone(), |sync, id| async move {
                sync.sync_remove(&id).await;
            });
        }
        self.spawn_sync(id.clone(), move |sync, id| async move {
            sync.sync_update_qty(&id, qty).await;
        })
    }

    /// Remove a line, then sync the removal.
    pub fn remove_item(&self, id: &ProductId) -> Option<JoinHandle<()>> {
        self.store().remove_item(id);
        self.spawn_sync(id.clone(), |sync, id| async move {
            sync.sync_remove(&id).await;
        })
    }

    /// Empty the local cart. The server cart is not touched.
    pub fn clear(&self) {
        self.store().clear();
    }

    /// Schedule a sync operation on the product's lane.
    ///
    /// Returns `None` when the user is a guest or there is no runtime to run
    /// the task on.
    fn spawn_sync<F, Fut>(&self, id: ProductId, op: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce(SyncRef<A>, ProductId) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if !self.is_authenticated() {
            debug!(product_id = %id, "Guest cart, skipping sync");
            return None;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!(product_id = %id, "No async runtime, skipping sync");
            return None;
        };

        // Drawn before spawning so the lane order is the call order
        let ticket = self.inner.sequencer.ticket(&id);
        let sync = SyncRef(Arc::clone(&self.inner));

        Some(runtime.spawn(async move {
            let _turn = ticket.wait().await;
            op(sync, id).await;
        }))
    }
}

/// Owned handle to the coordinator, movable into spawned tasks.
pub struct SyncRef<A>(Arc<CartServiceInner<A>>);

impl<A> std::ops::Deref for SyncRef<A> {
    type Target = CartSync<A>;

    fn deref(&self) -> &CartSync<A> {
        &self.0.sync
    }
}
