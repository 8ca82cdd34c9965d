use super::backend::KeyValueStore;
use super::lock;
use crate::error::{GateError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory key-value backend for testing and ephemeral stores.
///
/// Uses `std::sync::Mutex` because the trait futures must be `Send`; locks are
/// never held across an `.await`.
#[derive(Default)]
pub struct MemBackend {
    values: Mutex<BTreeMap<String, String>>,
    write_counts: Mutex<HashMap<String, usize>>,
    simulate_write_error: Mutex<bool>,
    simulate_read_error: Mutex<bool>,
    write_delay: Mutex<Option<Duration>>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a backend pre-populated with `pairs`.
    pub fn with_values<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let backend = Self::new();
        {
            let mut values = lock(&backend.values);
            for (k, v) in pairs {
                values.insert(k.into(), v.into());
            }
        }
        backend
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        *lock(&self.simulate_write_error) = simulate;
    }

    /// Enable read error simulation (affects `get` and `list_keys`).
    pub fn set_simulate_read_error(&self, simulate: bool) {
        *lock(&self.simulate_read_error) = simulate;
    }

    /// Delay every `set` so tests can overlap concurrent writers.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        *lock(&self.write_delay) = delay;
    }

    /// Number of successful `set` calls for `key`.
    pub fn write_count(&self, key: &str) -> usize {
        lock(&self.write_counts).get(key).copied().unwrap_or(0)
    }

    /// Synchronous peek for assertions.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        lock(&self.values).clone()
    }
}

#[async_trait]
impl KeyValueStore for MemBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if *lock(&self.simulate_read_error) {
            return Err(GateError::Storage("Simulated read error".to_string()));
        }
        Ok(lock(&self.values).get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let delay = *lock(&self.write_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *lock(&self.simulate_write_error) {
            return Err(GateError::Storage("Simulated write error".to_string()));
        }
        lock(&self.values).insert(key.to_string(), value.to_string());
        *lock(&self.write_counts).entry(key.to_string()).or_insert(0) += 1;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        if *lock(&self.simulate_write_error) {
            return Err(GateError::Storage("Simulated write error".to_string()));
        }
        lock(&self.values).remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        if *lock(&self.simulate_read_error) {
            return Err(GateError::Storage("Simulated read error".to_string()));
        }
        Ok(lock(&self.values).keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let backend = MemBackend::new();
        backend.set("a", "1").await.unwrap();
        assert_eq!(backend.get("a").await.unwrap(), Some("1".to_string()));
        backend.remove("a").await.unwrap();
        assert_eq!(backend.get("a").await.unwrap(), None);
        // Removing again is fine
        backend.remove("a").await.unwrap();
    }

    #[tokio::test]
    async fn test_multi_remove_and_list() {
        let backend = MemBackend::with_values([("a", "1"), ("b", "2"), ("c", "3")]);
        backend
            .multi_remove(&["a".to_string(), "c".to_string()])
            .await
            .unwrap();
        assert_eq!(backend.list_keys().await.unwrap(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_simulated_errors() {
        let backend = MemBackend::new();
        backend.set_simulate_write_error(true);
        assert!(backend.set("a", "1").await.is_err());
        assert_eq!(backend.write_count("a"), 0);

        backend.set_simulate_read_error(true);
        assert!(backend.get("a").await.is_err());
        assert!(backend.list_keys().await.is_err());
    }
}
