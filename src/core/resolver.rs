use crate::core::partition::PartitionPathBuilder;
use crate::core::raw_store::RawObjectStore;
use crate::domain::model::{ObjectMeta, PartitionKeySet};
use crate::domain::ports::ObjectStore;
use crate::utils::error::{EtlError, Result};

/// Finds the most recently written artifact of a dataset.
pub struct LatestArtifactResolver<'a, S: ObjectStore> {
    store: &'a RawObjectStore<S>,
}

impl<'a, S: ObjectStore> LatestArtifactResolver<'a, S> {
    pub fn new(store: &'a RawObjectStore<S>) -> Self {
        Self { store }
    }

    /// Newest object (by modification time, then by name) under the dataset's
    /// partition path whose name ends with `expected_extension`.
    pub async fn find_latest(
        &self,
        source: &str,
        data_type: &str,
        expected_extension: &str,
        partition_keys: Option<&PartitionKeySet>,
    ) -> Result<String> {
        let empty = PartitionKeySet::new();
        let prefix = PartitionPathBuilder::build(source, data_type, partition_keys.unwrap_or(&empty));

        // trailing slash keeps sibling datasets (rosters vs rosters_weekly) out
        let latest = self
            .store
            .read_scan(&format!("{}/", prefix))
            .await?
            .filter(|o| o.name.ends_with(expected_extension))
            .max_by(|a: &ObjectMeta, b: &ObjectMeta| {
                a.updated_at
                    .cmp(&b.updated_at)
                    .then_with(|| a.name.cmp(&b.name))
            });

        match latest {
            Some(object) => {
                let uri = self.store.uri(&object.name);
                tracing::info!("🔍 Latest {} artifact: {}", data_type, uri);
                Ok(uri)
            }
            None => {
                let err = EtlError::ArtifactNotFoundError {
                    prefix,
                    extension: expected_extension.to_string(),
                };
                tracing::error!("❌ {}", err);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::MemoryObjectStore;
    use chrono::{TimeZone, Utc};

    async fn store_with(objects: &[(&str, u32)]) -> RawObjectStore<MemoryObjectStore> {
        let backend = MemoryObjectStore::new("nfl-raw");
        for (name, second) in objects {
            backend
                .insert_at(
                    name,
                    b"x".to_vec(),
                    Utc.with_ymd_and_hms(2025, 9, 5, 5, 0, *second).unwrap(),
                )
                .await;
        }
        RawObjectStore::new(backend)
    }

    #[tokio::test]
    async fn test_picks_newest_by_modification_time() {
        let store = store_with(&[
            ("raw/nfl/teams/2025-09-05_05-00-03.parquet", 3),
            ("raw/nfl/teams/2025-09-05_05-00-09.parquet", 9),
            ("raw/nfl/teams/2025-09-05_05-00-05.parquet", 5),
        ])
        .await;

        let uri = LatestArtifactResolver::new(&store)
            .find_latest("nfl", "teams", ".parquet", None)
            .await
            .unwrap();
        assert_eq!(uri, "mem://nfl-raw/raw/nfl/teams/2025-09-05_05-00-09.parquet");
    }

    #[tokio::test]
    async fn test_tie_goes_to_greatest_name() {
        let store = store_with(&[
            ("raw/nfl/teams/b.parquet", 4),
            ("raw/nfl/teams/c.parquet", 4),
            ("raw/nfl/teams/a.parquet", 4),
        ])
        .await;

        let uri = LatestArtifactResolver::new(&store)
            .find_latest("nfl", "teams", ".parquet", None)
            .await
            .unwrap();
        assert_eq!(uri, "mem://nfl-raw/raw/nfl/teams/c.parquet");
    }

    #[tokio::test]
    async fn test_other_extensions_are_not_found() {
        let store = store_with(&[
            ("raw/nfl/fines/2025-09-05_05-00-03/nfl_fines.ndjson", 3),
            ("raw/nfl/fines/notes.txt", 5),
        ])
        .await;

        let err = LatestArtifactResolver::new(&store)
            .find_latest("nfl", "fines", ".parquet", None)
            .await
            .unwrap_err();

        match err {
            EtlError::ArtifactNotFoundError { prefix, extension } => {
                assert_eq!(prefix, "raw/nfl/fines");
                assert_eq!(extension, ".parquet");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sibling_dataset_is_not_matched() {
        let store = store_with(&[
            ("raw/nfl/rosters/2025-09-05_05-00-01.parquet", 1),
            ("raw/nfl/rosters_weekly/2025-09-05_05-00-09.parquet", 9),
        ])
        .await;

        let uri = LatestArtifactResolver::new(&store)
            .find_latest("nfl", "rosters", ".parquet", None)
            .await
            .unwrap();
        assert_eq!(uri, "mem://nfl-raw/raw/nfl/rosters/2025-09-05_05-00-01.parquet");
    }

    #[tokio::test]
    async fn test_partition_keys_narrow_the_scan() {
        let store = store_with(&[
            ("raw/nfl/pbp/season=2024/2025-09-05_05-00-09.parquet", 9),
            ("raw/nfl/pbp/season=2025/2025-09-05_05-00-02.parquet", 2),
        ])
        .await;
        let keys = PartitionKeySet::new().with("season", 2025);

        let uri = LatestArtifactResolver::new(&store)
            .find_latest("nfl", "pbp", ".parquet", Some(&keys))
            .await
            .unwrap();
        assert_eq!(uri, "mem://nfl-raw/raw/nfl/pbp/season=2025/2025-09-05_05-00-02.parquet");
    }
}
