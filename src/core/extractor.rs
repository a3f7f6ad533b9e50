use crate::core::codec;
use crate::core::partition::PartitionPathBuilder;
use crate::core::raw_store::{Payload, RawObjectStore};
use crate::core::registry::DatasetRegistry;
use crate::domain::model::{Artifact, PartitionKeySet, SourceFormat, Table};
use crate::domain::ports::ObjectStore;
use crate::utils::error::{EtlError, Result};
use chrono::{DateTime, Datelike, Utc};

/// Season a date belongs to: January through August still count toward the
/// previous year's season.
pub fn season_for(date: DateTime<Utc>) -> u16 {
    let year = date.year();
    let season = if date.month() >= 9 { year } else { year - 1 };
    u16::try_from(season).unwrap_or(u16::MAX)
}

pub struct Extractor {
    registry: DatasetRegistry,
    source: String,
    current_season: u16,
}

impl Extractor {
    pub fn new(registry: DatasetRegistry, source: impl Into<String>, current_season: u16) -> Self {
        Self {
            registry,
            source: source.into(),
            current_season,
        }
    }

    pub fn registry(&self) -> &DatasetRegistry {
        &self.registry
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn current_season(&self) -> u16 {
        self.current_season
    }

    /// Pulls one dataset from its provider.
    ///
    /// Datasets that do not take seasons never see them; season-aware ones fall
    /// back to the current season when none (or an empty list) are given.
    pub async fn extract(&self, data_type: &str, seasons: Option<&[u16]>) -> Result<Table> {
        let Some(dataset) = self.registry.get(data_type) else {
            let err = self.registry.unknown(data_type);
            tracing::error!("❌ {}", err);
            return Err(err);
        };

        let default_seasons = [self.current_season];
        let seasons = if dataset.descriptor.accepts_seasons {
            Some(seasons.filter(|s| !s.is_empty()).unwrap_or(&default_seasons))
        } else {
            if seasons.is_some() {
                tracing::debug!("'{}' does not take seasons, ignoring {:?}", data_type, seasons);
            }
            None
        };

        tracing::info!("📥 Extracting {} for seasons: {:?}", data_type, seasons);

        match dataset.adapter.fetch(seasons).await {
            Ok(table) => {
                tracing::info!(
                    "✅ Successfully extracted {} rows of {}",
                    table.row_count(),
                    data_type
                );
                Ok(table)
            }
            Err(e) => {
                tracing::error!("❌ Error extracting {}: {}", data_type, e);
                Err(EtlError::ExtractionError {
                    data_type: data_type.to_string(),
                    source: Box::new(e),
                })
            }
        }
    }

    pub async fn extract_write<S: ObjectStore>(
        &self,
        data_type: &str,
        seasons: Option<&[u16]>,
        store: &RawObjectStore<S>,
    ) -> Result<(Table, Artifact)> {
        self.extract_write_partitioned(data_type, seasons, &PartitionKeySet::new(), store)
            .await
    }

    /// Extracts and writes one timestamped artifact under the dataset's partition path.
    ///
    /// Empty results are written too. A tabular result without any columns has no
    /// schema to write and fails as `ExtractionError` before anything is stored.
    pub async fn extract_write_partitioned<S: ObjectStore>(
        &self,
        data_type: &str,
        seasons: Option<&[u16]>,
        partition_keys: &PartitionKeySet,
        store: &RawObjectStore<S>,
    ) -> Result<(Table, Artifact)> {
        let table = self.extract(data_type, seasons).await?;
        let descriptor = self.registry.descriptor(data_type)?;
        if descriptor.is_tabular() && table.columns.is_empty() {
            tracing::error!("❌ {} came back without any columns", data_type);
            return Err(EtlError::ExtractionError {
                data_type: data_type.to_string(),
                source: Box::new(EtlError::processing(
                    "provider returned a table without columns",
                )),
            });
        }
        let path = PartitionPathBuilder::build(&self.source, data_type, partition_keys);

        let written = if descriptor.is_tabular() {
            let filename = format!("{}{}", data_type, descriptor.expected_extension);
            store
                .write_stamped(Payload::Table(&table), &path, &filename, true)
                .await
        } else {
            let data = codec::encode_ndjson(&table)?;
            let filename = descriptor.raw_filename(&self.source);
            store
                .write_stamped(
                    Payload::Raw {
                        data,
                        content_type: "application/x-ndjson",
                    },
                    &path,
                    &filename,
                    true,
                )
                .await
        };

        let (uri, created_at) = written.inspect_err(|e| {
            tracing::error!("❌ Writing {} to the raw zone failed: {}", data_type, e);
        })?;

        tracing::info!("📦 Wrote {} rows of {} to {}", table.row_count(), data_type, uri);

        let artifact = Artifact {
            format: SourceFormat::from_uri(&uri),
            uri,
            dataset_id: data_type.to_string(),
            partition_keys: partition_keys.clone(),
            created_at,
        };
        Ok((table, artifact))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::MemoryObjectStore;
    use crate::domain::model::{DatasetDescriptor, Record};
    use crate::domain::ports::{Clock, DatasetAdapter};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingAdapter {
        calls: Mutex<Vec<Option<Vec<u16>>>>,
        fail: bool,
        columnless: bool,
    }

    impl RecordingAdapter {
        fn calls(&self) -> Vec<Option<Vec<u16>>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DatasetAdapter for RecordingAdapter {
        async fn fetch(&self, seasons: Option<&[u16]>) -> Result<Table> {
            self.calls.lock().unwrap().push(seasons.map(<[u16]>::to_vec));
            if self.fail {
                return Err(EtlError::processing("provider returned 503"));
            }
            if self.columnless {
                return Ok(Table::default());
            }
            let mut data = HashMap::new();
            data.insert("team_abbr".to_string(), serde_json::json!("KC"));
            Ok(Table::new(vec!["team_abbr".into()], vec![Record { data }]))
        }
    }

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn extractor_with(
        descriptor: DatasetDescriptor,
        adapter: Arc<RecordingAdapter>,
    ) -> Extractor {
        let mut registry = DatasetRegistry::new();
        registry.register(descriptor, adapter).unwrap();
        Extractor::new(registry, "nfl", 2025)
    }

    #[test]
    fn test_season_for_date() {
        assert_eq!(season_for(Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap()), 2025);
        assert_eq!(season_for(Utc.with_ymd_and_hms(2026, 2, 8, 0, 0, 0).unwrap()), 2025);
        assert_eq!(season_for(Utc.with_ymd_and_hms(2026, 8, 31, 0, 0, 0).unwrap()), 2025);
    }

    #[tokio::test]
    async fn test_missing_seasons_default_to_current() {
        let adapter = Arc::new(RecordingAdapter::default());
        let extractor = extractor_with(DatasetDescriptor::tabular("injuries", true), adapter.clone());

        extractor.extract("injuries", None).await.unwrap();
        extractor.extract("injuries", Some(&[2023, 2024])).await.unwrap();
        extractor.extract("injuries", Some(&[])).await.unwrap();

        assert_eq!(
            adapter.calls(),
            vec![Some(vec![2025]), Some(vec![2023, 2024]), Some(vec![2025])]
        );
    }

    #[tokio::test]
    async fn test_seasons_not_forwarded_when_unsupported() {
        let adapter = Arc::new(RecordingAdapter::default());
        let extractor = extractor_with(DatasetDescriptor::tabular("teams", false), adapter.clone());

        extractor.extract("teams", Some(&[2099])).await.unwrap();

        assert_eq!(adapter.calls(), vec![None]);
    }

    #[tokio::test]
    async fn test_unknown_dataset_makes_no_adapter_call() {
        let adapter = Arc::new(RecordingAdapter::default());
        let extractor = extractor_with(DatasetDescriptor::tabular("teams", false), adapter.clone());

        let err = extractor.extract("unknown_type", None).await.unwrap_err();

        assert!(matches!(err, EtlError::UnknownDatasetError { .. }));
        assert!(err.to_string().contains("Available types: teams"));
        assert!(adapter.calls().is_empty());
    }

    #[tokio::test]
    async fn test_adapter_failure_is_wrapped() {
        let adapter = Arc::new(RecordingAdapter {
            fail: true,
            ..Default::default()
        });
        let extractor = extractor_with(DatasetDescriptor::tabular("pbp", true), adapter);

        match extractor.extract("pbp", None).await.unwrap_err() {
            EtlError::ExtractionError { data_type, source } => {
                assert_eq!(data_type, "pbp");
                assert!(source.to_string().contains("503"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_extract_write_records_as_ndjson() {
        let t = Utc.with_ymd_and_hms(2025, 9, 10, 12, 0, 0).unwrap();
        let backend = MemoryObjectStore::new("nfl-raw");
        let store = RawObjectStore::new(backend.clone()).with_clock(Arc::new(FixedClock(t)));
        let extractor = extractor_with(
            DatasetDescriptor::records("fines"),
            Arc::new(RecordingAdapter::default()),
        );

        let (table, artifact) = extractor.extract_write("fines", None, &store).await.unwrap();

        assert_eq!(table.row_count(), 1);
        assert_eq!(
            artifact.uri,
            "mem://nfl-raw/raw/nfl/fines/2025-09-10_12-00-00/nfl_fines.ndjson"
        );
        assert_eq!(artifact.format, SourceFormat::NewlineDelimitedJson);
        assert_eq!(artifact.created_at, t);
        let body = backend
            .object("raw/nfl/fines/2025-09-10_12-00-00/nfl_fines.ndjson")
            .await
            .unwrap();
        assert_eq!(String::from_utf8(body).unwrap(), r#"{"team_abbr":"KC"}"#);
    }

    #[tokio::test]
    async fn test_extract_write_partitioned_path() {
        let t = Utc.with_ymd_and_hms(2025, 9, 10, 12, 0, 0).unwrap();
        let store = RawObjectStore::new(MemoryObjectStore::new("nfl-raw"))
            .with_clock(Arc::new(FixedClock(t)));
        let extractor = extractor_with(
            DatasetDescriptor::tabular("play_by_play", true),
            Arc::new(RecordingAdapter::default()),
        );
        let keys = PartitionKeySet::new().with("week", 3).with("season", 2025);

        let (_, artifact) = extractor
            .extract_write_partitioned("play_by_play", Some(&[2025]), &keys, &store)
            .await
            .unwrap();

        assert_eq!(
            artifact.uri,
            "mem://nfl-raw/raw/nfl/play_by_play/season=2025/week=3/2025-09-10_12-00-00.parquet"
        );
        assert_eq!(artifact.partition_keys, keys);
    }

    #[tokio::test]
    async fn test_columnless_tabular_result_is_not_written() {
        let backend = MemoryObjectStore::new("nfl-raw");
        let store = RawObjectStore::new(backend.clone());
        let extractor = extractor_with(
            DatasetDescriptor::tabular("teams", false),
            Arc::new(RecordingAdapter {
                columnless: true,
                ..Default::default()
            }),
        );

        match extractor.extract_write("teams", None, &store).await.unwrap_err() {
            EtlError::ExtractionError { data_type, source } => {
                assert_eq!(data_type, "teams");
                assert!(source.to_string().contains("without columns"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(backend.list("raw/").await.unwrap().is_empty());
    }
}
