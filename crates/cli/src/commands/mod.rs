//! CLI command implementations.

pub mod cart;

use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Cart setup or remote API failure.
    #[error(transparent)]
    Cart(#[from] storefront_cart::CartError),

    /// The server cart could not be loaded.
    #[error("Could not load the server cart")]
    Unavailable,

    /// Background sync task failed to complete.
    #[error("Sync task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Guest cart file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Guest cart file is not a JSON array of cart lines.
    #[error("Invalid guest cart file: {0}")]
    InvalidCartFile(#[from] serde_json::Error),

    /// Timed out waiting for the server cart after login.
    #[error("Timed out waiting for the server cart")]
    Timeout,
}
