//! Error types for kvchain stores

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while talking to a store or a chain of stores
#[derive(Error, Debug)]
pub enum StoreError {
    /// Key is not present in the store.
    ///
    /// Backends that return this (rather than `Ok(None)`) let a chain fall
    /// through to farther tiers on a miss.
    #[error("key not found")]
    NotFound,

    /// I/O error from the underlying medium or a streamed reader
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Medium failure reported by a backend adapter
    #[error("store {store} failed: {reason}")]
    Backend { store: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Lookup of a store name that is not registered
    #[error("Unknown store: {0}")]
    UnknownStore(String),
}

impl StoreError {
    /// Create a backend failure for the named store
    pub fn backend(store: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Backend {
            store: store.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for the explicit not-found signal
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}
