//! Tier 1: in-process token slot.

use super::token::CachedToken;
use tokio::sync::RwLock;

/// Holds at most one token for the lifetime of the owning manager.
///
/// The lock is only held for the clone or the swap, never across I/O.
#[derive(Debug, Default)]
pub struct MemoryTier {
    slot: RwLock<Option<CachedToken>>,
}

impl MemoryTier {
    /// Create an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current entry, usable or not.
    pub async fn get(&self) -> Option<CachedToken> {
        self.slot.read().await.clone()
    }

    /// Replace the current entry.
    pub async fn set(&self, token: CachedToken) {
        *self.slot.write().await = Some(token);
    }

    /// Drop the current entry.
    pub async fn clear(&self) {
        *self.slot.write().await = None;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::secret::SecretString;

    #[tokio::test]
    async fn test_set_replaces_and_clear_empties() {
        let tier = MemoryTier::new();
        assert!(tier.get().await.is_none());

        tier.set(CachedToken::new(SecretString::from("a"), 1)).await;
        tier.set(CachedToken::new(SecretString::from("b"), 2)).await;
        assert_eq!(tier.get().await.unwrap().expires_at(), 2);

        tier.clear().await;
        assert!(tier.get().await.is_none());
    }
}
