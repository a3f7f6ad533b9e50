// Adapters layer: concrete implementations of the domain ports
// (object storage, warehouse, data providers).

pub mod providers;
pub mod storage;
pub mod warehouse;
