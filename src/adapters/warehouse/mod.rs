mod bigquery;
mod memory;

pub use bigquery::{BigQueryWarehouse, DEFAULT_BIGQUERY_ENDPOINT};
pub use memory::MemoryWarehouse;
