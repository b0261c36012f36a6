//! The remote key-value collaborator.
//!
//! The access protocol persists records only through [`KeyValueStore`]. A
//! missing key is `Ok(None)`; transport failures are
//! [`LockerError::StorageUnavailable`]. The two are never conflated.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::DEFAULT_MAX_VALUE_LEN;
use crate::error::LockerError;
use crate::record::StoreKey;

/// A string-to-string store addressed by `write:`/`view:` keys.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value under `key`, or `None` if nothing is stored there.
    async fn get(&self, key: &StoreKey) -> Result<Option<String>, LockerError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &StoreKey, value: String) -> Result<(), LockerError>;
}

#[async_trait]
impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    async fn get(&self, key: &StoreKey) -> Result<Option<String>, LockerError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &StoreKey, value: String) -> Result<(), LockerError> {
        (**self).set(key, value).await
    }
}

/// An in-process store.
///
/// Clones share the same map, so several sessions can open lockers against
/// one instance. Enforces the same value ceiling as the proxy.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
    max_value_len: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// An empty store with the default value ceiling.
    pub fn new() -> Self {
        Self::with_max_value_len(DEFAULT_MAX_VALUE_LEN)
    }

    /// An empty store rejecting values longer than `max_value_len`.
    pub fn with_max_value_len(max_value_len: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_value_len,
        }
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &StoreKey) -> Result<Option<String>, LockerError> {
        Ok(self.entries.read().await.get(&key.to_string()).cloned())
    }

    async fn set(&self, key: &StoreKey, value: String) -> Result<(), LockerError> {
        if value.len() > self.max_value_len {
            return Err(LockerError::StorageUnavailable("data too large".into()));
        }
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}
