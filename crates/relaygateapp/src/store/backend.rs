use crate::error::Result;
use async_trait::async_trait;

/// Abstract interface for the platform key-value store.
///
/// This trait handles the "how" of durability (filesystem vs memory), while
/// [`super::app_store::AppStore`] handles the "what" (the AppData document,
/// migration, write coalescing). Values are opaque strings; callers decide
/// whether they hold JSON.
///
/// Every method may fail. Callers in this crate log and degrade rather than
/// propagate, except on the restore commit path.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value. Returns Ok(None) if the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    /// MUST be atomic per key to avoid torn documents.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// List every key currently present.
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Remove several keys.
    async fn multi_remove(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.remove(key).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key).await
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        (**self).list_keys().await
    }

    async fn multi_remove(&self, keys: &[String]) -> Result<()> {
        (**self).multi_remove(keys).await
    }
}
