//! Cart configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CART_API_BASE_URL` - Base URL of the remote cart API (e.g., `https://api.example.com/v1`)
//!
//! ## Optional
//! - `CART_API_TOKEN` - Bearer token sent with every cart API request
//! - `CART_API_TIMEOUT_SECS` - Request timeout in seconds (default: 10)
//! - `CART_PLACEHOLDER_IMAGE` - Image used for hydrated lines without one
//!   (default: `/images/placeholder.png`)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Default request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default placeholder image path.
pub const DEFAULT_PLACEHOLDER_IMAGE: &str = "/images/placeholder.png";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Remote cart API configuration
    pub api: RemoteApiConfig,
    /// Image path for hydrated lines that carry no image
    pub placeholder_image: String,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Remote cart API configuration.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct RemoteApiConfig {
    /// Base URL; endpoints (`cart`, `cart/add`, `cart/item/{id}`) are relative to it
    pub base_url: Url,
    /// Optional bearer token
    pub access_token: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for RemoteApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RemoteApiConfig {
    /// Configuration for a base URL with no token and the default timeout.
    #[must_use]
    pub const fn new(base_url: Url) -> Self {
        Self {
            base_url,
            access_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = parse_base_url(&required(&lookup, "CART_API_BASE_URL")?)?;
        let access_token = optional(&lookup, "CART_API_TOKEN").map(SecretString::from);
        let timeout = optional(&lookup, "CART_API_TIMEOUT_SECS")
            .map_or(Ok(Duration::from_secs(DEFAULT_TIMEOUT_SECS)), |v| {
                parse_timeout(&v)
            })?;
        let placeholder_image = optional(&lookup, "CART_PLACEHOLDER_IMAGE")
            .unwrap_or_else(|| DEFAULT_PLACEHOLDER_IMAGE.to_string());
        let sentry_dsn = optional(&lookup, "SENTRY_DSN");

        Ok(Self {
            api: RemoteApiConfig {
                base_url,
                access_token,
                timeout,
            },
            placeholder_image,
            sentry_dsn,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required variable. Blank values count as missing.
fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, ConfigError> {
    optional(lookup, key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional variable. Blank values count as unset.
fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_base_url(value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar("CART_API_BASE_URL".to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "CART_API_BASE_URL".to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

fn parse_timeout(value: &str) -> Result<Duration, ConfigError> {
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        Ok(_) => Err(ConfigError::InvalidEnvVar(
            "CART_API_TIMEOUT_SECS".to_string(),
            "must be greater than zero".to_string(),
        )),
        Err(e) => Err(ConfigError::InvalidEnvVar(
            "CART_API_TIMEOUT_SECS".to_string(),
            e.to_string(),
        )),
    }
}
