//! JetStream KV document store
//!
//! One bucket holds every collection. Key layout: `<collection>.<id>`, e.g.
//! `houses.h_elberta` or `settings.app`.

use std::time::Duration;

use anyhow::Result;
use async_nats::header::{self, HeaderMap};
use async_nats::jetstream::{
    self,
    kv::{Operation, Store},
};
use async_trait::async_trait;
use futures_util::StreamExt;
use haven_core::store::{Entry, Revision};
use haven_core::{DocumentStore, StoreError, StoreEvent};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 256;
const REWATCH_DELAY: Duration = Duration::from_secs(5);
const KV_OPERATION: &str = "KV-Operation";
const KV_OPERATION_DELETE: &str = "DEL";

/// Document store backed by a JetStream KV bucket
#[derive(Clone)]
pub struct KvStore {
    jetstream: jetstream::Context,
    kv_store: Store,
    events: broadcast::Sender<StoreEvent>,
}

impl KvStore {
    /// Connect to NATS and open (or create) the bucket
    pub async fn connect(nats_url: &str, creds_path: Option<&str>, bucket_name: &str) -> Result<Self> {
        info!(
            "Connecting to NATS at {} for KV operations (bucket: {})",
            nats_url, bucket_name
        );

        let client = if let Some(creds_path) = creds_path {
            info!("Using credentials file: {}", creds_path);
            async_nats::ConnectOptions::new()
                .credentials_file(creds_path)
                .await?
                .connect(nats_url)
                .await?
        } else {
            warn!("No NATS credentials provided, connecting without auth");
            async_nats::connect(nats_url).await?
        };

        let jetstream = jetstream::new(client);

        let kv_store = match jetstream.get_key_value(bucket_name).await {
            Ok(store) => {
                info!("Using existing KV bucket: {}", bucket_name);
                store
            }
            Err(_) => {
                info!("Creating new KV bucket: {}", bucket_name);
                let config = jetstream::kv::Config {
                    bucket: bucket_name.to_string(),
                    description: "Haven houses, residents, chores and settings".to_string(),
                    history: 5,
                    ..Default::default()
                };
                jetstream.create_key_value(config).await?
            }
        };

        Ok(Self::from_store(jetstream, kv_store))
    }

    /// Wrap an open bucket and start relaying its changes
    pub fn from_store(jetstream: jetstream::Context, kv_store: Store) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        tokio::spawn(relay_changes(kv_store.clone(), events.clone()));
        Self {
            jetstream,
            kv_store,
            events,
        }
    }

    /// Subject a key's writes are published on
    fn subject(&self, key: &str) -> String {
        key_subject(
            self.kv_store.put_prefix.as_deref().unwrap_or(&self.kv_store.prefix),
            key,
        )
    }

    /// Publish a delete marker that the server only accepts at `expected`
    async fn delete_at(&self, key: &str, expected: Revision) -> Result<(), String> {
        let mut headers = HeaderMap::new();
        headers.insert(KV_OPERATION, KV_OPERATION_DELETE);
        headers.insert(
            header::NATS_EXPECTED_LAST_SUBJECT_SEQUENCE,
            header::HeaderValue::from(expected),
        );
        self.jetstream
            .publish_with_headers(self.subject(key), headers, Default::default())
            .await
            .map_err(|e| e.to_string())?
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Current revision of a live key, if any
    async fn current_revision(&self, key: &str) -> Option<Revision> {
        match self.kv_store.entry(key).await {
            Ok(Some(entry)) if entry.operation == Operation::Put => Some(entry.revision),
            _ => None,
        }
    }

    /// Classify a failed conditional write by looking at what is stored now
    async fn write_failure(
        &self,
        key: &str,
        expected: Option<Revision>,
        error: impl std::fmt::Display,
    ) -> StoreError {
        let current = self.current_revision(key).await;
        match (expected, current) {
            (None, Some(_)) => StoreError::Conflict {
                key: key.to_string(),
            },
            (Some(_), None) => StoreError::NotFound {
                key: key.to_string(),
            },
            (Some(expected), Some(current)) if expected != current => StoreError::Conflict {
                key: key.to_string(),
            },
            _ => StoreError::Backend(format!("write to {} failed: {}", key, error)),
        }
    }
}

#[async_trait]
impl DocumentStore for KvStore {
    async fn get(&self, key: &str) -> Result<Option<Entry>, StoreError> {
        let entry = self
            .kv_store
            .entry(key)
            .await
            .map_err(|e| StoreError::Backend(format!("read of {} failed: {}", key, e)))?;
        Ok(entry
            .filter(|e| e.operation == Operation::Put)
            .map(|e| Entry {
                key: key.to_string(),
                value: e.value.to_vec(),
                revision: e.revision,
            }))
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = self
            .kv_store
            .keys()
            .await
            .map_err(|e| StoreError::Backend(format!("key listing failed: {}", e)))?
            .boxed();

        let mut matching = Vec::new();
        while let Some(key_result) = keys.next().await {
            match key_result {
                Ok(key) if key.starts_with(prefix) => matching.push(key),
                Ok(_) => {}
                Err(e) => {
                    warn!("Error reading key from KV: {}", e);
                    return Err(StoreError::Backend(format!("key listing failed: {}", e)));
                }
            }
        }
        Ok(matching)
    }

    async fn create(&self, key: &str, value: Vec<u8>) -> Result<Revision, StoreError> {
        // Expected revision 0 only matches a key that has never been written;
        // a deleted key is recreated on top of its delete marker
        let expected = match self.kv_store.entry(key).await {
            Ok(Some(entry)) if entry.operation != Operation::Put => entry.revision,
            _ => 0,
        };
        match self.kv_store.update(key, value.into(), expected).await {
            Ok(revision) => {
                debug!("Created {} at revision {}", key, revision);
                Ok(revision)
            }
            Err(e) => Err(self.write_failure(key, None, e).await),
        }
    }

    async fn update(
        &self,
        key: &str,
        value: Vec<u8>,
        expected: Revision,
    ) -> Result<Revision, StoreError> {
        match self.kv_store.update(key, value.into(), expected).await {
            Ok(revision) => Ok(revision),
            Err(e) => {
                debug!("Update of {} at revision {} rejected: {}", key, expected, e);
                Err(self.write_failure(key, Some(expected), e).await)
            }
        }
    }

    async fn delete(&self, key: &str, expected: Option<Revision>) -> Result<(), StoreError> {
        let Some(current) = self.current_revision(key).await else {
            return Err(StoreError::NotFound {
                key: key.to_string(),
            });
        };
        let expected = expected.unwrap_or(current);
        match self.delete_at(key, expected).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.write_failure(key, Some(expected), e).await),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

fn key_subject(prefix: &str, key: &str) -> String {
    format!("{}{}", prefix, key)
}

/// Forward bucket changes to subscribers, re-watching after a failure
async fn relay_changes(kv_store: Store, events: broadcast::Sender<StoreEvent>) {
    loop {
        let reason = match kv_store.watch_all().await {
            Ok(mut watch) => {
                debug!("Watching KV bucket for changes");
                let mut reason = "watch stream ended".to_string();
                while let Some(item) = watch.next().await {
                    match item {
                        Ok(entry) => {
                            let event = match entry.operation {
                                Operation::Put => StoreEvent::Put {
                                    key: entry.key,
                                    revision: entry.revision,
                                },
                                Operation::Delete | Operation::Purge => {
                                    StoreEvent::Deleted { key: entry.key }
                                }
                            };
                            // No receivers is fine
                            let _ = events.send(event);
                        }
                        Err(e) => {
                            reason = format!("watch failed: {}", e);
                            break;
                        }
                    }
                }
                reason
            }
            Err(e) => format!("could not watch bucket: {}", e),
        };

        warn!("KV change relay interrupted: {}", reason);
        let _ = events.send(StoreEvent::Disconnected { reason });
        tokio::time::sleep(REWATCH_DELAY).await;
    }
}
