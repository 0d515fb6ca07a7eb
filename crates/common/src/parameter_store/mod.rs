//! Durable shared key-value store.
//!
//! The token cache uses this as its second tier and the service reads its
//! Auth0 credential bundle from it at startup. Values are opaque strings;
//! callers own the encoding.
//!
//! Backends:
//! - [`SsmParameterStore`]: AWS Systems Manager Parameter Store (`SecureString`)
//! - [`InMemoryParameterStore`]: process-local map for local runs
//!
//! The store offers no locking or compare-and-swap. Concurrent writers race
//! and the last write wins.

mod memory;
mod ssm;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use memory::InMemoryParameterStore;
pub use ssm::{SsmParameterStore, DEFAULT_REGION};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors from a parameter store backend.
///
/// A missing parameter is not an error; `get` returns `Ok(None)` for it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend call failed (network, throttling, service error).
    #[error("Parameter store request failed: {0}")]
    Backend(String),

    /// Caller lacks permission for the parameter or its KMS key.
    #[error("Parameter store access denied: {0}")]
    AccessDenied(String),

    /// The call did not finish within its time limit.
    #[error("Parameter store request timed out after {0:?}")]
    Timeout(Duration),
}

/// Read/write access to named parameters.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Fetch a parameter value, decrypting it if the backend encrypts.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend cannot be reached or refuses the
    /// request. A parameter that does not exist yields `Ok(None)`.
    async fn get(&self, name: &str) -> Result<Option<String>, StoreError>;

    /// Create or overwrite a parameter value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write is not accepted.
    async fn put(&self, name: &str, value: &str) -> Result<(), StoreError>;
}
