//! Reaction to authentication transitions.
//!
//! - logged out → logged in (including starting logged in): a non-empty
//!   guest cart is pushed once, then the cart is hydrated from the server
//! - logged in → logged out: the local cart is cleared
//!
//! Repeated notifications with an unchanged value do nothing.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, instrument};

use crate::remote::CartApi;
use crate::service::CartService;

/// Spawn [`watch_auth`] on the current runtime.
///
/// # Panics
///
/// Panics if called outside of a Tokio runtime.
pub fn spawn_auth_watcher<A: CartApi>(
    service: CartService<A>,
    auth: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(watch_auth(service, auth))
}

/// Follow the authentication signal until its sender is dropped.
pub async fn watch_auth<A: CartApi>(service: CartService<A>, mut auth: watch::Receiver<bool>) {
    let mut authenticated = false;
    loop {
        let now = *auth.borrow_and_update();
        match (authenticated, now) {
            (false, true) => on_login(&service).await,
            (true, false) => on_logout(&service),
            _ => {}
        }
        authenticated = now;

        if auth.changed().await.is_err() {
            break;
        }
    }
}

#[instrument(skip(service))]
async fn on_login<A: CartApi>(service: &CartService<A>) {
    if !service.store().is_empty() {
        info!(lines = service.store().len(), "Migrating guest cart");
        service.sync().push_local_cart_to_server().await;
    }
    service.sync().hydrate_from_server().await;
}

fn on_logout<A: CartApi>(service: &CartService<A>) {
    info!("Logged out, clearing local cart");
    service.clear();
}
