//! Typed access to the document store

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{HavenError, HavenResult};
use crate::model::{AppSettings, Chore, House, Resident};
use crate::store::{DocumentStore, Revision, StoreError, StoreEvent};

pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// A persisted entity with its collection name and identifier
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync {
    const COLLECTION: &'static str;
    const KIND: &'static str;

    fn id(&self) -> &str;

    fn key_for(id: &str) -> String {
        format!("{}.{}", Self::COLLECTION, id)
    }
}

impl Document for House {
    const COLLECTION: &'static str = "houses";
    const KIND: &'static str = "House";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Document for Resident {
    const COLLECTION: &'static str = "residents";
    const KIND: &'static str = "Resident";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Document for Chore {
    const COLLECTION: &'static str = "chores";
    const KIND: &'static str = "Chore";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Document for AppSettings {
    const COLLECTION: &'static str = "settings";
    const KIND: &'static str = "Settings";

    fn id(&self) -> &str {
        Self::ID
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub revision: Revision,
}

#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl Repository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Bound every store call by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe()
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Store {} exceeded {:?}", operation, self.timeout);
                Err(StoreError::Timeout {
                    operation,
                    after: self.timeout,
                })
            }
        }
    }

    pub async fn get<T: Document>(&self, id: &str) -> Result<Option<Versioned<T>>, StoreError> {
        let key = T::key_for(id);
        match self.bounded("get", self.store.get(&key)).await? {
            Some(entry) => {
                let value = serde_json::from_slice::<T>(&entry.value).map_err(|e| {
                    StoreError::Serialization {
                        key: key.clone(),
                        message: e.to_string(),
                    }
                })?;
                Ok(Some(Versioned {
                    value,
                    revision: entry.revision,
                }))
            }
            None => Ok(None),
        }
    }

    /// Fetch a document that must exist
    pub async fn require<T: Document>(&self, id: &str) -> HavenResult<Versioned<T>> {
        self.get::<T>(id)
            .await?
            .ok_or_else(|| HavenError::not_found(T::KIND, id))
    }

    /// All documents of a collection, sorted by key. Any undecodable entry fails the listing.
    pub async fn list<T: Document>(&self) -> Result<Vec<Versioned<T>>, StoreError> {
        let prefix = format!("{}.", T::COLLECTION);
        let mut keys = self.bounded("keys", self.store.keys(&prefix)).await?;
        keys.sort();

        let mut documents = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(entry) = self.bounded("get", self.store.get(&key)).await? else {
                // Deleted between listing and reading
                continue;
            };
            let value = serde_json::from_slice::<T>(&entry.value).map_err(|e| {
                warn!("Failed to parse document {}: {}", key, e);
                StoreError::Serialization {
                    key: key.clone(),
                    message: e.to_string(),
                }
            })?;
            documents.push(Versioned {
                value,
                revision: entry.revision,
            });
        }

        debug!("Listed {} {} documents", documents.len(), T::COLLECTION);
        Ok(documents)
    }

    pub async fn insert<T: Document>(&self, document: &T) -> Result<Revision, StoreError> {
        let key = T::key_for(document.id());
        let value = encode(&key, document)?;
        self.bounded("create", self.store.create(&key, value)).await
    }

    /// Compare-and-set write against `expected`
    pub async fn replace<T: Document>(
        &self,
        document: &T,
        expected: Revision,
    ) -> Result<Revision, StoreError> {
        let key = T::key_for(document.id());
        let value = encode(&key, document)?;
        self.bounded("update", self.store.update(&key, value, expected))
            .await
    }

    pub async fn remove<T: Document>(
        &self,
        id: &str,
        expected: Option<Revision>,
    ) -> Result<(), StoreError> {
        let key = T::key_for(id);
        self.bounded("delete", self.store.delete(&key, expected))
            .await
    }

    /// Read a document, apply `change`, and write it back against the revision read.
    pub async fn modify<T, F>(&self, id: &str, change: F) -> HavenResult<Versioned<T>>
    where
        T: Document,
        F: FnOnce(&mut T) -> HavenResult<()>,
    {
        let current = self.require::<T>(id).await?;
        let mut value = current.value;
        change(&mut value)?;
        let revision = self.replace(&value, current.revision).await?;
        Ok(Versioned { value, revision })
    }
}

fn encode<T: Serialize>(key: &str, document: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(document).map_err(|e| StoreError::Serialization {
        key: key.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Entry, MemoryStore};

    fn house(id: &str) -> House {
        House {
            id: id.to_string(),
            name: format!("House {}", id),
            address: "1 Main St".to_string(),
            rooms: vec![],
            image: None,
        }
    }

    #[tokio::test]
    async fn test_insert_then_list_sorted() {
        let repo = Repository::new(Arc::new(MemoryStore::new()));
        repo.insert(&house("b")).await.unwrap();
        repo.insert(&house("a")).await.unwrap();

        let houses = repo.list::<House>().await.unwrap();
        let ids: Vec<&str> = houses.iter().map(|h| h.value.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_undecodable_document_fails_listing() {
        let store = Arc::new(MemoryStore::new());
        let repo = Repository::new(store.clone());
        repo.insert(&house("a")).await.unwrap();
        store
            .create("houses.b", b"{\"id\": 7".to_vec())
            .await
            .unwrap();

        let err = repo.list::<House>().await.unwrap_err();

        assert!(matches!(err, StoreError::Serialization { ref key, .. } if key == "houses.b"));
    }

    #[tokio::test]
    async fn test_modify_rejects_missing_document() {
        let repo = Repository::new(Arc::new(MemoryStore::new()));
        let err = repo
            .modify::<House, _>("nope", |_| Ok(()))
            .await
            .unwrap_err();
        assert!(matches!(err, HavenError::NotFound { kind: "House", .. }));
    }

    #[tokio::test]
    async fn test_stale_replace_is_conflict() {
        let repo = Repository::new(Arc::new(MemoryStore::new()));
        let first = repo.insert(&house("a")).await.unwrap();
        repo.replace(&house("a"), first).await.unwrap();

        let err = repo.replace(&house("a"), first).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    /// Never answers, so every call runs into the repository timeout
    struct StalledStore(broadcast::Sender<StoreEvent>);

    #[async_trait::async_trait]
    impl DocumentStore for StalledStore {
        async fn get(&self, _key: &str) -> Result<Option<Entry>, StoreError> {
            std::future::pending().await
        }

        async fn keys(&self, _prefix: &str) -> Result<Vec<String>, StoreError> {
            std::future::pending().await
        }

        async fn create(&self, _key: &str, _value: Vec<u8>) -> Result<Revision, StoreError> {
            std::future::pending().await
        }

        async fn update(
            &self,
            _key: &str,
            _value: Vec<u8>,
            _expected: Revision,
        ) -> Result<Revision, StoreError> {
            std::future::pending().await
        }

        async fn delete(&self, _key: &str, _expected: Option<Revision>) -> Result<(), StoreError> {
            std::future::pending().await
        }

        fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
            self.0.subscribe()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_store_times_out() {
        let (events, _) = broadcast::channel(1);
        let repo = Repository::new(Arc::new(StalledStore(events)))
            .with_timeout(Duration::from_secs(3));

        let err = repo.get::<House>("h1").await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Timeout {
                operation: "get",
                after: Duration::from_secs(3),
            }
        );
    }
}
