//! Scriptable parameter store for tests.
//!
//! Counts calls and lets a test force failures or latency on either
//! operation, so cache tier behavior can be asserted without AWS.
//!
//! ```rust,ignore
//! use common::parameter_store::testing::MockParameterStore;
//!
//! let store = MockParameterStore::new().with_value("/p", "{}");
//! store.fail_puts(true);
//! ```

use super::{ParameterStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory store with call counters and failure injection.
#[derive(Debug, Default)]
pub struct MockParameterStore {
    values: Mutex<HashMap<String, String>>,
    get_calls: AtomicU32,
    put_calls: AtomicU32,
    fail_gets: AtomicBool,
    fail_puts: AtomicBool,
    get_delay: Mutex<Option<Duration>>,
}

impl MockParameterStore {
    /// Create an empty mock store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a parameter value.
    #[must_use]
    pub fn with_value(self, name: &str, value: &str) -> Self {
        self.set_value(name, value);
        self
    }

    /// Delay every `get` by `delay` before answering.
    #[must_use]
    pub fn with_get_delay(self, delay: Duration) -> Self {
        if let Ok(mut slot) = self.get_delay.lock() {
            *slot = Some(delay);
        }
        self
    }

    /// Overwrite a parameter value without counting it as a `put`.
    pub fn set_value(&self, name: &str, value: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(name.to_string(), value.to_string());
        }
    }

    /// Current value of a parameter.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<String> {
        self.values
            .lock()
            .ok()
            .and_then(|values| values.get(name).cloned())
    }

    /// Make subsequent `get` calls fail (or succeed again).
    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `put` calls fail (or succeed again).
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Number of `get` calls so far.
    #[must_use]
    pub fn get_calls(&self) -> u32 {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Number of `put` calls so far.
    #[must_use]
    pub fn put_calls(&self) -> u32 {
        self.put_calls.load(Ordering::SeqCst)
    }

    fn lock_poisoned() -> StoreError {
        StoreError::Backend("mock store lock poisoned".to_string())
    }
}

#[async_trait]
impl ParameterStore for MockParameterStore {
    async fn get(&self, name: &str) -> Result<Option<String>, StoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.get_delay.lock().map_err(|_| Self::lock_poisoned())?;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected get failure".to_string()));
        }

        let values = self.values.lock().map_err(|_| Self::lock_poisoned())?;
        Ok(values.get(name).cloned())
    }

    async fn put(&self, name: &str, value: &str) -> Result<(), StoreError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected put failure".to_string()));
        }

        let mut values = self.values.lock().map_err(|_| Self::lock_poisoned())?;
        values.insert(name.to_string(), value.to_string());
        Ok(())
    }
}
