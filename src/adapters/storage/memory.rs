use crate::domain::model::ObjectMeta;
use crate::domain::ports::ObjectStore;
use crate::utils::error::{EtlError, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<String, StoredObject>,
    write_failure: Option<String>,
}

/// In-process object store; clones share the same contents.
#[derive(Debug, Clone)]
pub struct MemoryObjectStore {
    bucket: String,
    state: Arc<Mutex<State>>,
}

impl MemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Stores an object with an explicit modification time.
    pub async fn insert_at(&self, name: &str, data: Vec<u8>, updated_at: DateTime<Utc>) {
        let mut state = self.state.lock().await;
        state
            .objects
            .insert(name.to_string(), StoredObject { data, updated_at });
    }

    pub async fn object(&self, name: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().await;
        state.objects.get(name).map(|o| o.data.clone())
    }

    /// Every following `put` fails with `message`.
    pub async fn fail_writes(&self, message: &str) {
        self.state.lock().await.write_failure = Some(message.to_string());
    }
}

impl ObjectStore for MemoryObjectStore {
    fn uri(&self, name: &str) -> String {
        format!("mem://{}/{}", self.bucket, name)
    }

    fn name_from_uri(&self, uri: &str) -> Option<String> {
        uri.strip_prefix("mem://")?
            .strip_prefix(self.bucket.as_str())?
            .strip_prefix('/')
            .map(str::to_string)
    }

    async fn put(&self, name: &str, data: Vec<u8>, _content_type: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(message) = &state.write_failure {
            return Err(EtlError::WriteError {
                uri: format!("mem://{}/{}", self.bucket, name),
                message: message.clone(),
            });
        }
        state.objects.insert(
            name.to_string(),
            StoredObject {
                data,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>> {
        let state = self.state.lock().await;
        state
            .objects
            .get(name)
            .map(|o| o.data.clone())
            .ok_or_else(|| {
                EtlError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Object not found: {}", name),
                ))
            })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let state = self.state.lock().await;
        Ok(state
            .objects
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, o)| ObjectMeta {
                name: name.clone(),
                updated_at: o.updated_at,
            })
            .collect())
    }
}
