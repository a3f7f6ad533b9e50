pub mod codec;
pub mod driver;
pub mod extractor;
pub mod loader;
pub mod partition;
pub mod raw_store;
pub mod registry;
pub mod resolver;

pub use driver::{PipelineDriver, RunReport};
pub use extractor::Extractor;
pub use loader::WarehouseLoader;
pub use partition::PartitionPathBuilder;
pub use raw_store::{Payload, RawObjectStore};
pub use registry::DatasetRegistry;
pub use resolver::LatestArtifactResolver;
pub use crate::utils::error::Result;
