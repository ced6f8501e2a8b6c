//! Error types.

use seedor_api::SeedorError;
use thiserror::Error;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
///
/// A failed authentication is never an `Error`: verification yields `None`/`false`.
/// What remains here is misconfiguration and infrastructure failure.
#[derive(Debug, Error)]
pub enum Error {
    /// The signing secret could not be used as an HMAC key.
    #[error("invalid signing key: {0}")]
    Key(String),

    /// Key derivation parameters were rejected.
    #[error("key derivation failed: {0}")]
    Kdf(String),

    /// Cookie name or value is not representable in a header.
    #[error("invalid cookie: {0}")]
    Cookie(String),

    /// The user store failed.
    #[error(transparent)]
    Store(#[from] SeedorError),

    /// JSON serialization error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
