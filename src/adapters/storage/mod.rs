mod gcs;
mod local;
mod memory;

pub use gcs::{GcsObjectStore, DEFAULT_GCS_ENDPOINT};
pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;
