use crate::domain::model::{SourceFormat, TableTarget, WriteMode};
use crate::domain::ports::{CsvOptions, LoadJob, Warehouse};
use crate::utils::error::Result;

/// Loads raw-zone artifacts into warehouse tables.
pub struct WarehouseLoader<W: Warehouse> {
    warehouse: W,
}

impl<W: Warehouse> WarehouseLoader<W> {
    pub fn new(warehouse: W) -> Self {
        Self { warehouse }
    }

    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }

    /// Load job description for an artifact; the format comes from the URI suffix.
    pub fn job_for(&self, uri: &str, table: &TableTarget, write_mode: WriteMode) -> LoadJob {
        let format = SourceFormat::from_uri(uri);
        LoadJob {
            source_uri: uri.to_string(),
            destination: table.clone(),
            format,
            write_mode,
            autodetect: true,
            ignore_unknown_values: true,
            create_if_needed: true,
            csv: (format == SourceFormat::Csv).then(CsvOptions::default),
        }
    }

    /// Runs the load to completion and returns the table's row count afterwards.
    pub async fn load(&self, uri: &str, table: &TableTarget, write_mode: WriteMode) -> Result<u64> {
        let job = self.job_for(uri, table, write_mode);
        tracing::info!(
            "🚚 Loading {} into {} ({}, {})",
            uri,
            table,
            job.format.warehouse_name(),
            write_mode
        );

        if let Err(e) = self.warehouse.run_load_job(&job).await {
            tracing::error!("❌ Load of {} into {} failed: {}", uri, table, e);
            return Err(e);
        }

        let rows = self.row_count(table).await?;
        tracing::info!("✅ Loaded {} rows into {}", rows, table);
        Ok(rows)
    }

    pub async fn table_exists(&self, table: &TableTarget) -> Result<bool> {
        Ok(self.warehouse.table_row_count(table).await?.is_some())
    }

    /// 0 for tables that do not exist.
    pub async fn row_count(&self, table: &TableTarget) -> Result<u64> {
        Ok(self.warehouse.table_row_count(table).await?.unwrap_or(0))
    }

    pub async fn delete_table(&self, table: &TableTarget) -> Result<()> {
        if self.warehouse.delete_table(table).await? {
            tracing::info!("🗑️ Deleted table {}", table);
        } else {
            tracing::warn!("⚠️ Table {} does not exist, nothing to delete", table);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::MemoryObjectStore;
    use crate::adapters::warehouse::MemoryWarehouse;
    use crate::domain::ports::ObjectStore;
    use crate::utils::error::EtlError;

    fn target() -> TableTarget {
        TableTarget::new("proj", "nfl_raw", "fines")
    }

    async fn setup() -> (MemoryObjectStore, WarehouseLoader<MemoryWarehouse>) {
        let store = MemoryObjectStore::new("nfl-raw");
        store
            .put("raw/nfl/fines/a.ndjson", b"{\"a\":1}\n{\"a\":2}\n".to_vec(), "")
            .await
            .unwrap();
        store
            .put("raw/nfl/fines/b.ndjson", b"{\"a\":3}".to_vec(), "")
            .await
            .unwrap();
        store
            .put("raw/nfl/games.csv", b"game_id,season\n1,2025\n2,2025\n3,2025\n".to_vec(), "")
            .await
            .unwrap();
        let loader = WarehouseLoader::new(MemoryWarehouse::new(store.clone()));
        (store, loader)
    }

    #[test]
    fn test_job_options() {
        let loader = WarehouseLoader::new(MemoryWarehouse::new(MemoryObjectStore::new("b")));

        let job = loader.job_for("gs://b/raw/nfl/games.csv", &target(), WriteMode::Append);
        assert_eq!(job.format, SourceFormat::Csv);
        assert_eq!(job.csv, Some(CsvOptions::default()));
        assert!(job.autodetect && job.ignore_unknown_values && job.create_if_needed);

        let job = loader.job_for("gs://b/raw/nfl/pbp/x.parquet", &target(), WriteMode::Replace);
        assert_eq!(job.format, SourceFormat::Parquet);
        assert!(job.csv.is_none());
    }

    #[tokio::test]
    async fn test_replace_is_idempotent_and_append_accumulates() {
        let (_store, loader) = setup().await;
        let a = "mem://nfl-raw/raw/nfl/fines/a.ndjson";
        let b = "mem://nfl-raw/raw/nfl/fines/b.ndjson";

        assert_eq!(loader.load(a, &target(), WriteMode::Replace).await.unwrap(), 2);
        assert_eq!(loader.load(a, &target(), WriteMode::Replace).await.unwrap(), 2);
        assert_eq!(loader.load(b, &target(), WriteMode::Append).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_csv_lines_all_count_without_leading_row_skip() {
        let (store, loader) = setup().await;
        store
            .put("raw/nfl/pairs.csv", b"1,2\n3,4\n".to_vec(), "")
            .await
            .unwrap();

        let rows = loader
            .load("mem://nfl-raw/raw/nfl/pairs.csv", &target(), WriteMode::Replace)
            .await
            .unwrap();
        assert_eq!(rows, 2);

        // 標題列也算資料列
        let rows = loader
            .load("mem://nfl-raw/raw/nfl/games.csv", &target(), WriteMode::Replace)
            .await
            .unwrap();
        assert_eq!(rows, 4);

        let jobs = loader.warehouse().jobs().await;
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].csv.as_ref().map(|c| c.skip_leading_rows), Some(0));
        assert_eq!(jobs[1].write_mode, WriteMode::Replace);
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_previous_table() {
        let (_store, loader) = setup().await;
        let a = "mem://nfl-raw/raw/nfl/fines/a.ndjson";
        loader.load(a, &target(), WriteMode::Replace).await.unwrap();

        loader.warehouse().fail_next_job("schema mismatch").await;
        let err = loader
            .load("mem://nfl-raw/raw/nfl/fines/b.ndjson", &target(), WriteMode::Replace)
            .await
            .unwrap_err();

        assert!(matches!(err, EtlError::LoadError { .. }));
        assert_eq!(loader.row_count(&target()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_table_utilities() {
        let (_store, loader) = setup().await;
        assert!(!loader.table_exists(&target()).await.unwrap());
        assert_eq!(loader.row_count(&target()).await.unwrap(), 0);
        loader.delete_table(&target()).await.unwrap();

        loader
            .load("mem://nfl-raw/raw/nfl/fines/a.ndjson", &target(), WriteMode::Append)
            .await
            .unwrap();
        assert!(loader.table_exists(&target()).await.unwrap());

        loader.delete_table(&target()).await.unwrap();
        assert!(!loader.table_exists(&target()).await.unwrap());
    }
}
