//! Process-local parameter store.

use super::{ParameterStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Parameter store held entirely in memory.
///
/// Useful for local development where no shared store exists. With this
/// backend the second cache tier only survives as long as the process.
#[derive(Debug, Default)]
pub struct InMemoryParameterStore {
    values: RwLock<HashMap<String, String>>,
}

impl InMemoryParameterStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with one parameter.
    #[must_use]
    pub fn with_parameter(name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut values = HashMap::new();
        values.insert(name.into(), value.into());
        Self {
            values: RwLock::new(values),
        }
    }
}

#[async_trait]
impl ParameterStore for InMemoryParameterStore {
    async fn get(&self, name: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.read().await.get(name).cloned())
    }

    async fn put(&self, name: &str, value: &str) -> Result<(), StoreError> {
        self.values
            .write()
            .await
            .insert(name.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_parameter_is_none() {
        let store = InMemoryParameterStore::new();
        assert_eq!(store.get("/absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = InMemoryParameterStore::with_parameter("/p", "first");
        assert_eq!(store.get("/p").await.unwrap().as_deref(), Some("first"));

        store.put("/p", "second").await.unwrap();
        assert_eq!(store.get("/p").await.unwrap().as_deref(), Some("second"));
    }
}
