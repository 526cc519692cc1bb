//! Cart commands.
//!
//! Every command starts from a freshly hydrated cart, applies its change
//! through the same service UI code uses, waits for the background sync,
//! and prints the server's view afterwards.

use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use storefront_cart::{CartConfig, CartService, CartSnapshot, HttpCartApi, auth};
use storefront_cart_core::{CartItem, CartLine, Price, ProductId};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::CommandError;

/// Authenticated service plus the sender keeping the auth signal alive.
struct Session {
    service: CartService<HttpCartApi>,
    auth: watch::Sender<bool>,
}

fn connect(config: &CartConfig, authenticated: bool) -> Result<Session, CommandError> {
    let (auth, rx) = watch::channel(authenticated);
    let service = CartService::from_config(config, rx)?;
    Ok(Session { service, auth })
}

async fn hydrate(service: &CartService<HttpCartApi>) -> Result<(), CommandError> {
    if service.sync().hydrate_from_server().await {
        Ok(())
    } else {
        Err(CommandError::Unavailable)
    }
}

async fn finish(
    service: &CartService<HttpCartApi>,
    handle: Option<JoinHandle<()>>,
) -> Result<(), CommandError> {
    if let Some(handle) = handle {
        handle.await?;
    }
    hydrate(service).await?;
    print_cart(&service.store().snapshot());
    Ok(())
}

/// Print the server cart.
///
/// # Errors
///
/// Returns an error if the cart cannot be loaded.
pub async fn show(config: &CartConfig) -> Result<(), CommandError> {
    let session = connect(config, true)?;
    hydrate(&session.service).await?;
    print_cart(&session.service.store().snapshot());
    Ok(())
}

/// Add units of a product.
///
/// Name and price only shape the local line; the printed cart is the
/// server's.
///
/// # Errors
///
/// Returns an error if the cart cannot be loaded.
pub async fn add(
    config: &CartConfig,
    product_id: &str,
    qty: u32,
    name: Option<String>,
    price: Option<Decimal>,
) -> Result<(), CommandError> {
    let session = connect(config, true)?;
    let service = &session.service;
    hydrate(service).await?;

    let id = ProductId::new(product_id);
    let name = name.unwrap_or_else(|| format!("Product #{id}"));
    let item = CartItem::new(id, name, price.map_or(Price::ZERO, Price::new));

    let handle = service.add_item(item, qty);
    finish(service, handle).await
}

/// Set the quantity of a product.
///
/// # Errors
///
/// Returns an error if the cart cannot be loaded.
pub async fn set_qty(config: &CartConfig, product_id: &str, qty: i64) -> Result<(), CommandError> {
    let session = connect(config, true)?;
    let service = &session.service;
    hydrate(service).await?;

    let handle = service.update_qty(&ProductId::new(product_id), qty);
    finish(service, handle).await
}

/// Remove a product.
///
/// # Errors
///
/// Returns an error if the cart cannot be loaded.
pub async fn remove(config: &CartConfig, product_id: &str) -> Result<(), CommandError> {
    let session = connect(config, true)?;
    let service = &session.service;
    hydrate(service).await?;

    let handle = service.remove_item(&ProductId::new(product_id));
    finish(service, handle).await
}

/// Print the remote cart-item id for a product.
///
/// # Errors
///
/// Returns an error if the service cannot be built.
#[allow(clippy::print_stdout)]
pub async fn resolve(config: &CartConfig, product_id: &str) -> Result<(), CommandError> {
    let session = connect(config, true)?;
    let id = ProductId::new(product_id);

    match session.service.sync().resolve_remote_item_id(&id).await {
        Some(cart_item_id) => println!("{cart_item_id}"),
        None => println!("product {id} is not in the server cart"),
    }
    Ok(())
}

/// Migrate a guest cart file into the server cart.
///
/// Loads the lines as a guest, then flips the auth signal so the login
/// path pushes and hydrates them, exactly as the storefront does.
///
/// # Errors
///
/// Returns an error if the file is unreadable or invalid, or if the server
/// cart does not arrive in time.
pub async fn push(config: &CartConfig, file: &Path) -> Result<(), CommandError> {
    let lines = read_guest_cart(file)?;
    let line_count = lines.len();

    let session = connect(config, false)?;
    let service = &session.service;
    for line in lines {
        service.add_item(line.item, line.qty);
    }

    let watcher = auth::spawn_auth_watcher(service.clone(), service.auth());
    let mut changes = service.store().subscribe();
    session.auth.send_replace(true);

    // One request per pushed line plus the hydration fetch
    let budget = login_budget(config.api.timeout, line_count);
    let hydrated = tokio::time::timeout(budget, async {
        changes
            .wait_for(|cart| cart.hydrated_at().is_some())
            .await
            .is_ok()
    })
    .await
    .unwrap_or(false);
    watcher.abort();

    if !hydrated {
        return Err(CommandError::Timeout);
    }
    print_cart(&service.store().snapshot());
    Ok(())
}

/// Time allowed for the login push plus the hydration fetch.
fn login_budget(timeout: Duration, line_count: usize) -> Duration {
    u32::try_from(line_count.saturating_add(1))
        .ok()
        .and_then(|requests| timeout.checked_mul(requests))
        .unwrap_or(Duration::MAX)
}

fn read_guest_cart(file: &Path) -> Result<Vec<CartLine>, CommandError> {
    let text = std::fs::read_to_string(file).map_err(|source| CommandError::Io {
        path: file.display().to_string(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}

#[allow(clippy::print_stdout)]
fn print_cart(cart: &CartSnapshot) {
    if cart.is_empty() {
        println!("Cart is empty");
        return;
    }
    for line in cart.lines() {
        println!(
            "{:>8}  {:<32} {:>4} x {:>10} = {:>10}",
            line.id(),
            line.item.name,
            line.qty,
            line.item.price.to_string(),
            line.line_total().to_string(),
        );
    }
    println!("{} item(s), subtotal {}", cart.count(), cart.subtotal());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_budget_covers_each_request() {
        assert_eq!(login_budget(Duration::from_secs(10), 2), Duration::from_secs(30));
    }

    #[test]
    fn test_login_budget_saturates_on_huge_timeout() {
        assert_eq!(login_budget(Duration::from_secs(u64::MAX), 3), Duration::MAX);
        assert_eq!(login_budget(Duration::from_secs(1), usize::MAX), Duration::MAX);
    }
}
