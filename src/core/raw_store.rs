use crate::core::codec;
use crate::domain::model::{ObjectMeta, Table};
use crate::domain::ports::{Clock, ObjectStore, SystemClock};
use crate::utils::error::{EtlError, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// 時間戳格式 (UTC, 秒精度)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

pub const DEFAULT_ROW_GROUP_SIZE: usize = 10_000;

pub enum Payload<'a> {
    /// Serialized to Snappy-compressed Parquet.
    Table(&'a Table),
    /// Written as-is.
    Raw { data: Vec<u8>, content_type: &'a str },
}

/// Finite, single-pass listing of the objects under a prefix at scan time.
pub struct ObjectScan {
    inner: std::vec::IntoIter<ObjectMeta>,
}

impl Iterator for ObjectScan {
    type Item = ObjectMeta;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

pub struct RawObjectStore<S: ObjectStore> {
    backend: S,
    clock: Arc<dyn Clock>,
    row_group_size: usize,
}

impl<S: ObjectStore> RawObjectStore<S> {
    pub fn new(backend: S) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemClock),
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_row_group_size(mut self, row_group_size: usize) -> Self {
        self.row_group_size = row_group_size;
        self
    }

    pub fn uri(&self, name: &str) -> String {
        self.backend.uri(name)
    }

    /// Object name for a write, without touching the backend.
    pub fn object_name(
        &self,
        tabular: bool,
        path: &str,
        filename: &str,
        timestamp: Option<&str>,
    ) -> String {
        let path = path.trim_end_matches('/');
        match (tabular, timestamp) {
            (true, Some(ts)) => format!("{}/{}.parquet", path, ts),
            (false, Some(ts)) => format!("{}/{}/{}", path, ts, filename),
            (_, None) => format!("{}/{}", path, filename),
        }
    }

    /// Writes one artifact and returns its URI.
    ///
    /// With `include_timestamp` each call gets a distinct name unless two writes
    /// land in the same UTC second. Without it the name is stable and a repeat
    /// write overwrites the object.
    pub async fn write(
        &self,
        payload: Payload<'_>,
        path: &str,
        filename: &str,
        include_timestamp: bool,
    ) -> Result<String> {
        self.write_stamped(payload, path, filename, include_timestamp)
            .await
            .map(|(uri, _)| uri)
    }

    /// Same as [`Self::write`], also returning the clock reading used for the name.
    pub async fn write_stamped(
        &self,
        payload: Payload<'_>,
        path: &str,
        filename: &str,
        include_timestamp: bool,
    ) -> Result<(String, DateTime<Utc>)> {
        let now = self.clock.now();
        let timestamp = include_timestamp.then(|| now.format(TIMESTAMP_FORMAT).to_string());

        let (name, data, content_type) = match payload {
            Payload::Table(table) => {
                let name = self.object_name(true, path, filename, timestamp.as_deref());
                let data = codec::encode_parquet(table, self.row_group_size).map_err(|e| {
                    EtlError::WriteError {
                        uri: self.backend.uri(&name),
                        message: format!("parquet encoding failed: {}", e),
                    }
                })?;
                (name, data, "application/octet-stream")
            }
            Payload::Raw { data, content_type } => {
                let name = self.object_name(false, path, filename, timestamp.as_deref());
                (name, data, content_type)
            }
        };

        let uri = self.backend.uri(&name);
        let size = data.len();

        if let Err(e) = self.backend.put(&name, data, content_type).await {
            tracing::error!("❌ Write to {} failed: {}", uri, e);
            return Err(match e {
                EtlError::WriteError { .. } => e,
                other => EtlError::WriteError {
                    uri,
                    message: other.to_string(),
                },
            });
        }

        tracing::debug!("💾 Wrote {} bytes to {}", size, uri);
        Ok((uri, now))
    }

    /// Lists the objects under `prefix`; every call rescans the store.
    pub async fn read_scan(&self, prefix: &str) -> Result<ObjectScan> {
        let objects = self.backend.list(prefix).await?;
        tracing::debug!("🔎 Scanned {} objects under {}", objects.len(), prefix);
        Ok(ObjectScan {
            inner: objects.into_iter(),
        })
    }

    pub async fn read(&self, uri: &str) -> Result<Vec<u8>> {
        let name = self
            .backend
            .name_from_uri(uri)
            .ok_or_else(|| EtlError::ValidationError {
                message: format!("'{}' does not belong to this object store", uri),
            })?;
        self.backend.get(&name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::MemoryObjectStore;
    use crate::domain::model::Record;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct StepClock {
        times: Mutex<Vec<DateTime<Utc>>>,
    }

    impl StepClock {
        fn new(mut times: Vec<DateTime<Utc>>) -> Self {
            times.reverse();
            Self {
                times: Mutex::new(times),
            }
        }
    }

    impl Clock for StepClock {
        fn now(&self) -> DateTime<Utc> {
            self.times.lock().unwrap().pop().unwrap()
        }
    }

    fn team_table() -> Table {
        let mut data = HashMap::new();
        data.insert("team_abbr".to_string(), serde_json::json!("KC"));
        Table::new(vec!["team_abbr".to_string()], vec![Record { data }])
    }

    #[tokio::test]
    async fn test_tabular_write_uses_timestamped_parquet_name() {
        let t = Utc.with_ymd_and_hms(2025, 9, 5, 5, 0, 7).unwrap();
        let backend = MemoryObjectStore::new("nfl-raw");
        let store =
            RawObjectStore::new(backend.clone()).with_clock(Arc::new(StepClock::new(vec![t])));

        let uri = store
            .write(Payload::Table(&team_table()), "raw/nfl/teams", "teams.parquet", true)
            .await
            .unwrap();

        assert_eq!(uri, "mem://nfl-raw/raw/nfl/teams/2025-09-05_05-00-07.parquet");
        assert!(backend
            .object("raw/nfl/teams/2025-09-05_05-00-07.parquet")
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_raw_write_interposes_timestamp_directory() {
        let t = Utc.with_ymd_and_hms(2025, 9, 5, 5, 0, 7).unwrap();
        let store = RawObjectStore::new(MemoryObjectStore::new("nfl-raw"))
            .with_clock(Arc::new(StepClock::new(vec![t])));

        let uri = store
            .write(
                Payload::Raw {
                    data: b"{\"a\":1}".to_vec(),
                    content_type: "application/x-ndjson",
                },
                "raw/nfl/fines",
                "nfl_fines.ndjson",
                true,
            )
            .await
            .unwrap();

        assert_eq!(
            uri,
            "mem://nfl-raw/raw/nfl/fines/2025-09-05_05-00-07/nfl_fines.ndjson"
        );
        assert_eq!(store.read(&uri).await.unwrap(), b"{\"a\":1}".to_vec());
    }

    #[tokio::test]
    async fn test_timestamped_writes_in_different_seconds_are_distinct() {
        let t1 = Utc.with_ymd_and_hms(2025, 9, 5, 5, 0, 7).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 9, 5, 5, 0, 8).unwrap();
        let store = RawObjectStore::new(MemoryObjectStore::new("nfl-raw"))
            .with_clock(Arc::new(StepClock::new(vec![t1, t2])));
        let table = team_table();

        let first = store
            .write(Payload::Table(&table), "raw/nfl/teams", "teams.parquet", true)
            .await
            .unwrap();
        let second = store
            .write(Payload::Table(&table), "raw/nfl/teams", "teams.parquet", true)
            .await
            .unwrap();

        assert_ne!(first, second);
        assert!(!store.read(&first).await.unwrap().is_empty());
        assert!(!store.read(&second).await.unwrap().is_empty());
        assert_eq!(store.read_scan("raw/nfl/teams/").await.unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_untimestamped_write_overwrites_in_place() {
        let store = RawObjectStore::new(MemoryObjectStore::new("nfl-raw"));
        let raw = |body: &str| Payload::Raw {
            data: body.as_bytes().to_vec(),
            content_type: "text/plain",
        };

        let first = store
            .write(raw("one"), "raw/nfl/fines", "latest.ndjson", false)
            .await
            .unwrap();
        let second = store
            .write(raw("two"), "raw/nfl/fines", "latest.ndjson", false)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first, "mem://nfl-raw/raw/nfl/fines/latest.ndjson");
        assert_eq!(store.read(&first).await.unwrap(), b"two".to_vec());
    }

    #[tokio::test]
    async fn test_backend_failure_is_write_error() {
        let backend = MemoryObjectStore::new("nfl-raw");
        backend.fail_writes("403 Forbidden").await;
        let store = RawObjectStore::new(backend);

        let err = store
            .write(Payload::Table(&team_table()), "raw/nfl/teams", "teams.parquet", true)
            .await
            .unwrap_err();

        match err {
            EtlError::WriteError { uri, message } => {
                assert!(uri.starts_with("mem://nfl-raw/raw/nfl/teams/"));
                assert!(message.contains("403"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_rejects_foreign_uri() {
        let store = RawObjectStore::new(MemoryObjectStore::new("nfl-raw"));
        assert!(store.read("gs://other/raw/x.parquet").await.is_err());
    }
}
