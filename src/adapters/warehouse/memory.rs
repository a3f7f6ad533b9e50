use crate::adapters::storage::MemoryObjectStore;
use crate::core::codec;
use crate::domain::model::{SourceFormat, TableTarget, WriteMode};
use crate::domain::ports::{LoadJob, ObjectStore, Warehouse};
use crate::utils::error::{EtlError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct State {
    tables: HashMap<String, u64>,
    jobs: Vec<LoadJob>,
    failure: Option<String>,
}

/// Row-counting warehouse that reads artifacts from a [`MemoryObjectStore`].
///
/// CSV rows are counted after skipping the job's `skip_leading_rows`; with the
/// default of 0 every line is a row.
#[derive(Debug, Clone)]
pub struct MemoryWarehouse {
    store: MemoryObjectStore,
    state: Arc<Mutex<State>>,
}

impl MemoryWarehouse {
    pub fn new(store: MemoryObjectStore) -> Self {
        Self {
            store,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// The next load job fails with `message`; the table is left untouched.
    pub async fn fail_next_job(&self, message: &str) {
        self.state.lock().await.failure = Some(message.to_string());
    }

    pub async fn jobs(&self) -> Vec<LoadJob> {
        self.state.lock().await.jobs.clone()
    }

    async fn count_rows(&self, job: &LoadJob) -> Result<u64> {
        let name = self
            .store
            .name_from_uri(&job.source_uri)
            .ok_or_else(|| EtlError::processing(format!("unreadable URI {}", job.source_uri)))?;
        let data = self.store.get(&name).await?;

        match job.format {
            SourceFormat::Parquet => codec::parquet_row_count(data),
            SourceFormat::NewlineDelimitedJson => codec::ndjson_row_count(&data),
            SourceFormat::Csv => {
                let options = job.csv.clone().unwrap_or_default();
                let delimiter = u8::try_from(options.field_delimiter).map_err(|_| {
                    EtlError::processing(format!(
                        "unsupported CSV delimiter {:?}",
                        options.field_delimiter
                    ))
                })?;
                let quote = u8::try_from(options.quote).map_err(|_| {
                    EtlError::processing(format!("unsupported CSV quote {:?}", options.quote))
                })?;
                let mut reader = csv::ReaderBuilder::new()
                    .has_headers(false)
                    .delimiter(delimiter)
                    .quote(quote)
                    .from_reader(data.as_slice());

                let mut rows = 0;
                for record in reader.records().skip(options.skip_leading_rows as usize) {
                    record?;
                    rows += 1;
                }
                Ok(rows)
            }
        }
    }
}

impl Warehouse for MemoryWarehouse {
    async fn run_load_job(&self, job: &LoadJob) -> Result<()> {
        let table = job.destination.to_string();
        let load_error = |message: String| EtlError::LoadError {
            table: table.clone(),
            message,
        };

        self.state.lock().await.jobs.push(job.clone());

        if let Some(message) = self.state.lock().await.failure.take() {
            return Err(load_error(message));
        }

        let rows = self
            .count_rows(job)
            .await
            .map_err(|e| load_error(e.to_string()))?;

        let mut state = self.state.lock().await;
        if !job.create_if_needed && !state.tables.contains_key(&table) {
            return Err(load_error("table does not exist".to_string()));
        }

        let entry = state.tables.entry(table).or_insert(0);
        match job.write_mode {
            WriteMode::Append => *entry += rows,
            WriteMode::Replace => *entry = rows,
        }
        Ok(())
    }

    async fn table_row_count(&self, table: &TableTarget) -> Result<Option<u64>> {
        let state = self.state.lock().await;
        Ok(state.tables.get(&table.to_string()).copied())
    }

    async fn delete_table(&self, table: &TableTarget) -> Result<bool> {
        let mut state = self.state.lock().await;
        Ok(state.tables.remove(&table.to_string()).is_some())
    }
}
