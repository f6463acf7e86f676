//! Inventory errors
//!
//! `NotFound` and `NotReady` are statuses the caller acts on; everything
//! else is a transport or protocol failure.

/// Inventory client error
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    /// Resource does not exist
    #[error("not found: {path}")]
    NotFound { path: String },

    /// Provider inventory is still loading
    #[error("inventory not ready: {path}")]
    NotReady { path: String },

    /// Unexpected HTTP status
    #[error("{path}: unexpected status {status}")]
    Status { path: String, status: u16 },

    /// Base URL or path did not form a valid URL
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// CA bundle could not be parsed
    #[error("failed to parse cacert: {0}")]
    Certificate(String),

    /// Response body did not decode
    #[error("decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Connection or protocol failure
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
}

impl InventoryError {
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[inline]
    #[must_use]
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotReady { .. })
    }
}
