use async_trait::async_trait;
use cadastro_common::{IngestError, Result};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::ObjectStore;

/// Process-local object store
///
/// Clones share the same objects. Listing returns keys in lexical order.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    objects: Arc<RwLock<BTreeMap<String, String>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_objects<K, V>(objects: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let objects = objects
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            objects: Arc::new(RwLock::new(objects)),
            unavailable: Arc::default(),
        }
    }

    pub async fn put(&self, key: impl Into<String>, content: impl Into<String>) {
        self.objects.write().await.insert(key.into(), content.into());
    }

    /// Make every subsequent call fail with `StoreUnavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IngestError::StoreUnavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn list_objects(&self) -> Result<Vec<String>> {
        self.check_available()?;
        Ok(self.objects.read().await.keys().cloned().collect())
    }

    async fn read_object(&self, key: &str) -> Result<String> {
        self.check_available()?;
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| IngestError::ObjectNotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_and_read() {
        let store = InMemoryStore::with_objects([("b.csv", "x"), ("a.csv", "y")]);

        assert_eq!(store.list_objects().await.unwrap(), vec!["a.csv", "b.csv"]);
        assert_eq!(store.read_object("b.csv").await.unwrap(), "x");
    }

    #[tokio::test]
    async fn test_missing_key() {
        let store = InMemoryStore::new();
        let err = store.read_object("nope.csv").await.unwrap_err();
        assert!(matches!(err, IngestError::ObjectNotFound(ref k) if k == "nope.csv"));
    }

    #[tokio::test]
    async fn test_unavailable() {
        let store = InMemoryStore::new();
        store.put("a.csv", "name,age,city").await;
        store.set_unavailable(true);

        assert!(matches!(
            store.list_objects().await,
            Err(IngestError::StoreUnavailable(_))
        ));
        assert!(matches!(
            store.read_object("a.csv").await,
            Err(IngestError::StoreUnavailable(_))
        ));

        store.set_unavailable(false);
        assert_eq!(store.list_objects().await.unwrap().len(), 1);
    }
}
