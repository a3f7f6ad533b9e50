use crate::domain::model::{ObjectMeta, SourceFormat, Table, TableTarget, WriteMode};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;

/// Object-storage backend for the raw zone. Object names are bucket-relative
/// (`raw/nfl/teams/...`); URIs are the backend's fully qualified form.
pub trait ObjectStore: Send + Sync {
    fn uri(&self, name: &str) -> String;

    /// Inverse of [`ObjectStore::uri`]; `None` when the URI belongs to another store.
    fn name_from_uri(&self, uri: &str) -> Option<String>;

    fn put(
        &self,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    fn get(&self, name: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;

    fn list(&self, prefix: &str) -> impl Future<Output = Result<Vec<ObjectMeta>>> + Send;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CsvOptions {
    pub field_delimiter: char,
    pub skip_leading_rows: u32,
    pub quote: char,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            field_delimiter: ',',
            skip_leading_rows: 0,
            quote: '"',
        }
    }
}

/// A warehouse load of one raw-zone artifact into one table.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadJob {
    pub source_uri: String,
    pub destination: TableTarget,
    pub format: SourceFormat,
    pub write_mode: WriteMode,
    pub autodetect: bool,
    pub ignore_unknown_values: bool,
    pub create_if_needed: bool,
    pub csv: Option<CsvOptions>,
}

pub trait Warehouse: Send + Sync {
    /// Submits the job and waits for it to finish. A job that ends with errors
    /// is reported as `LoadError`.
    fn run_load_job(&self, job: &LoadJob) -> impl Future<Output = Result<()>> + Send;

    /// `None` when the table does not exist.
    fn table_row_count(
        &self,
        table: &TableTarget,
    ) -> impl Future<Output = Result<Option<u64>>> + Send;

    /// Returns `false` when there was nothing to delete.
    fn delete_table(&self, table: &TableTarget) -> impl Future<Output = Result<bool>> + Send;
}

/// Provider-specific pull for one dataset type.
#[async_trait]
pub trait DatasetAdapter: Send + Sync {
    /// `seasons` is `None` for datasets that do not take a season argument.
    async fn fetch(&self, seasons: Option<&[u16]>) -> Result<Table>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
