pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::storage::{GcsObjectStore, LocalObjectStore, MemoryObjectStore};
pub use adapters::warehouse::{BigQueryWarehouse, MemoryWarehouse};
pub use config::AppConfig;
pub use core::{
    DatasetRegistry, Extractor, LatestArtifactResolver, PartitionPathBuilder, Payload,
    PipelineDriver, RawObjectStore, RunReport, WarehouseLoader,
};
pub use domain::model::{Artifact, PartitionKeySet, SourceFormat, Table, TableTarget, WriteMode};
pub use utils::error::{EtlError, Result};
