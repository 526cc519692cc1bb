//! Unified error type for cart setup and direct API use.
//!
//! Sync operations never return errors; this type only surfaces when
//! building a service from configuration or when calling [`crate::remote::CartApi`]
//! directly (the CLI does both).

use thiserror::Error;

use crate::config::ConfigError;
use crate::remote::RemoteError;

/// Cart-level error type.
#[derive(Debug, Error)]
pub enum CartError {
    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// The remote cart API failed.
    #[error("Remote cart error: {0}")]
    Remote(#[from] RemoteError),
}
