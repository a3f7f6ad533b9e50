use crate::core::extractor::Extractor;
use crate::core::loader::WarehouseLoader;
use crate::core::raw_store::RawObjectStore;
use crate::core::resolver::LatestArtifactResolver;
use crate::domain::model::{Artifact, PartitionKeySet, TableTarget, WriteMode};
use crate::domain::ports::{ObjectStore, Warehouse};
use crate::utils::error::Result;
use serde::Serialize;

/// Outcome of a full extract + load run for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub data_type: String,
    pub rows_extracted: usize,
    pub artifact_uri: String,
    pub rows_loaded: u64,
}

/// Entry points for whatever triggers a pipeline (CLI, scheduler).
pub struct PipelineDriver<S: ObjectStore, W: Warehouse> {
    extractor: Extractor,
    store: RawObjectStore<S>,
    loader: WarehouseLoader<W>,
    project: String,
    warehouse_dataset: String,
}

impl<S: ObjectStore, W: Warehouse> PipelineDriver<S, W> {
    pub fn new(
        extractor: Extractor,
        store: RawObjectStore<S>,
        loader: WarehouseLoader<W>,
        project: impl Into<String>,
        warehouse_dataset: impl Into<String>,
    ) -> Self {
        Self {
            extractor,
            store,
            loader,
            project: project.into(),
            warehouse_dataset: warehouse_dataset.into(),
        }
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub fn store(&self) -> &RawObjectStore<S> {
        &self.store
    }

    pub fn loader(&self) -> &WarehouseLoader<W> {
        &self.loader
    }

    /// Raw-layer table a dataset loads into.
    pub fn table_for(&self, data_type: &str) -> TableTarget {
        TableTarget::for_dataset(&self.project, &self.warehouse_dataset, data_type)
    }

    pub async fn run_extract(&self, data_type: &str, seasons: Option<&[u16]>) -> Result<Artifact> {
        self.run_extract_partitioned(data_type, seasons, &PartitionKeySet::new())
            .await
    }

    pub async fn run_extract_partitioned(
        &self,
        data_type: &str,
        seasons: Option<&[u16]>,
        partition_keys: &PartitionKeySet,
    ) -> Result<Artifact> {
        let (_, artifact) = self
            .extractor
            .extract_write_partitioned(data_type, seasons, partition_keys, &self.store)
            .await?;
        Ok(artifact)
    }

    /// Loads the newest artifact of a dataset.
    pub async fn run_load(
        &self,
        data_type: &str,
        partition_keys: Option<&PartitionKeySet>,
        write_mode: WriteMode,
    ) -> Result<u64> {
        let descriptor = self.extractor.registry().descriptor(data_type)?;
        let uri = LatestArtifactResolver::new(&self.store)
            .find_latest(
                self.extractor.source(),
                data_type,
                &descriptor.expected_extension,
                partition_keys,
            )
            .await?;
        self.loader
            .load(&uri, &self.table_for(data_type), write_mode)
            .await
    }

    /// Loads a known artifact URI into the dataset's table.
    pub async fn load_uri(&self, data_type: &str, uri: &str, write_mode: WriteMode) -> Result<u64> {
        self.extractor.registry().descriptor(data_type)?;
        self.loader
            .load(uri, &self.table_for(data_type), write_mode)
            .await
    }

    /// Extract, write, resolve the newest artifact and replace the table with it.
    pub async fn run(&self, data_type: &str, seasons: Option<&[u16]>) -> Result<RunReport> {
        self.run_with_mode(data_type, seasons, WriteMode::Replace)
            .await
    }

    pub async fn run_with_mode(
        &self,
        data_type: &str,
        seasons: Option<&[u16]>,
        write_mode: WriteMode,
    ) -> Result<RunReport> {
        tracing::info!("🚀 Running pipeline for {}", data_type);

        let (table, artifact) = self
            .extractor
            .extract_write(data_type, seasons, &self.store)
            .await?;
        let rows_loaded = self.run_load(data_type, None, write_mode).await?;

        let report = RunReport {
            data_type: data_type.to_string(),
            rows_extracted: table.row_count(),
            artifact_uri: artifact.uri,
            rows_loaded,
        };
        tracing::info!(
            "🏁 {}: extracted {} rows, table now has {} rows",
            data_type,
            report.rows_extracted,
            report.rows_loaded
        );
        Ok(report)
    }
}
