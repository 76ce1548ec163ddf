//! Document store abstraction
//!
//! Keys are `<collection>.<id>`. Every stored value carries a revision, and
//! `update` only succeeds against the revision the caller last read, which is
//! what lets assignment operations detect a concurrent writer instead of
//! silently overwriting it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

pub type Revision = u64;

const EVENT_CAPACITY: usize = 256;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Revision conflict on {key}")]
    Conflict { key: String },

    #[error("Key not found: {key}")]
    NotFound { key: String },

    #[error("Store operation {operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Failed to (de)serialize {key}: {message}")]
    Serialization { key: String, message: String },

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// A stored value together with the revision it was written at
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: String,
    pub value: Vec<u8>,
    pub revision: Revision,
}

/// Change notification relayed to subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StoreEvent {
    Put { key: String, revision: Revision },
    Deleted { key: String },
    Disconnected { reason: String },
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Entry>, StoreError>;

    /// Keys starting with `prefix`, in no particular order
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Write a new key. Fails with `Conflict` if the key already exists.
    async fn create(&self, key: &str, value: Vec<u8>) -> Result<Revision, StoreError>;

    /// Replace a key only if its current revision equals `expected`
    async fn update(
        &self,
        key: &str,
        value: Vec<u8>,
        expected: Revision,
    ) -> Result<Revision, StoreError>;

    async fn delete(&self, key: &str, expected: Option<Revision>) -> Result<(), StoreError>;

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: BTreeMap<String, (Vec<u8>, Revision)>,
    last_revision: Revision,
}

impl MemoryState {
    fn next_revision(&mut self) -> Revision {
        self.last_revision += 1;
        self.last_revision
    }
}

/// Process-local store used by tests and single-node deployments
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            events,
        }
    }

    fn notify(&self, event: StoreEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Entry>, StoreError> {
        let guard = self.state.read().await;
        Ok(guard.entries.get(key).map(|(value, revision)| Entry {
            key: key.to_string(),
            value: value.clone(),
            revision: *revision,
        }))
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let guard = self.state.read().await;
        Ok(guard
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn create(&self, key: &str, value: Vec<u8>) -> Result<Revision, StoreError> {
        let mut guard = self.state.write().await;
        if guard.entries.contains_key(key) {
            return Err(StoreError::Conflict {
                key: key.to_string(),
            });
        }
        let revision = guard.next_revision();
        guard.entries.insert(key.to_string(), (value, revision));
        drop(guard);

        debug!("Created {} at revision {}", key, revision);
        self.notify(StoreEvent::Put {
            key: key.to_string(),
            revision,
        });
        Ok(revision)
    }

    async fn update(
        &self,
        key: &str,
        value: Vec<u8>,
        expected: Revision,
    ) -> Result<Revision, StoreError> {
        let mut guard = self.state.write().await;
        match guard.entries.get(key) {
            None => {
                return Err(StoreError::NotFound {
                    key: key.to_string(),
                })
            }
            Some((_, current)) if *current != expected => {
                debug!(
                    "Rejecting update of {}: expected revision {}, found {}",
                    key, expected, current
                );
                return Err(StoreError::Conflict {
                    key: key.to_string(),
                });
            }
            Some(_) => {}
        }
        let revision = guard.next_revision();
        guard.entries.insert(key.to_string(), (value, revision));
        drop(guard);

        self.notify(StoreEvent::Put {
            key: key.to_string(),
            revision,
        });
        Ok(revision)
    }

    async fn delete(&self, key: &str, expected: Option<Revision>) -> Result<(), StoreError> {
        let mut guard = self.state.write().await;
        let current = match guard.entries.get(key) {
            Some((_, revision)) => *revision,
            None => {
                return Err(StoreError::NotFound {
                    key: key.to_string(),
                })
            }
        };
        if expected.is_some_and(|rev| rev != current) {
            return Err(StoreError::Conflict {
                key: key.to_string(),
            });
        }
        guard.entries.remove(key);
        drop(guard);

        self.notify(StoreEvent::Deleted {
            key: key.to_string(),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}
