//! Storefront Cart CLI - Inspect and drive the remote cart.
//!
//! # Usage
//!
//! ```bash
//! # Show the server cart
//! cart-cli show
//!
//! # Add two units of product 7
//! cart-cli add 7 -q 2
//!
//! # Set product 7 to five units (0 removes it)
//! cart-cli set-qty 7 5
//!
//! # Remove product 7
//! cart-cli remove 7
//!
//! # Print the remote cart-item id for product 7
//! cart-cli resolve 7
//!
//! # Migrate a saved guest cart (JSON array of lines) into the server cart
//! cart-cli push guest-cart.json
//! ```
//!
//! # Environment Variables
//!
//! See `storefront_cart::config` (`CART_API_BASE_URL` is required).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use storefront_cart::CartConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "cart-cli")]
#[command(author, version, about = "Storefront cart CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hydrate from the server and print the cart
    Show,
    /// Add units of a product
    Add {
        /// Product id
        product_id: String,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        qty: u32,

        /// Display name for the local line
        #[arg(short, long)]
        name: Option<String>,

        /// Unit price for the local line
        #[arg(short, long)]
        price: Option<Decimal>,
    },
    /// Set the quantity of a product (0 or less removes it)
    SetQty {
        /// Product id
        product_id: String,

        /// New quantity
        #[arg(allow_negative_numbers = true)]
        qty: i64,
    },
    /// Remove a product
    Remove {
        /// Product id
        product_id: String,
    },
    /// Print the remote cart-item id for a product
    Resolve {
        /// Product id
        product_id: String,
    },
    /// Push a guest cart file into the server cart
    Push {
        /// JSON file holding an array of cart lines
        file: PathBuf,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CartConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Initialize tracing with `EnvFilter` and Sentry integration.
///
/// Defaults to info level for the cart crates if `RUST_LOG` is not set.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "storefront_cart=info,storefront_cart_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration first (needed for Sentry init)
    let config = match CartConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    if let Err(e) = run(cli, &config).await {
        tracing::error!("Command failed: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run(cli: Cli, config: &CartConfig) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Show => commands::cart::show(config).await,
        Commands::Add {
            product_id,
            qty,
            name,
            price,
        } => commands::cart::add(config, &product_id, qty, name, price).await,
        Commands::SetQty { product_id, qty } => {
            commands::cart::set_qty(config, &product_id, qty).await
        }
        Commands::Remove { product_id } => commands::cart::remove(config, &product_id).await,
        Commands::Resolve { product_id } => commands::cart::resolve(config, &product_id).await,
        Commands::Push { file } => commands::cart::push(config, &file).await,
    }
}
