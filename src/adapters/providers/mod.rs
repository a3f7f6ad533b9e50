mod fines;
mod nflverse;

pub use fines::{parse_sections, FinesScraper, WeekSection, DEFAULT_FINES_URL};
pub use nflverse::{
    infer_scalar, parse_csv, AssetLayout, NflverseAdapter, DEFAULT_DYNASTYPROCESS_BASE_URL,
    DEFAULT_FFOPPORTUNITY_BASE_URL, DEFAULT_NFLDATA_BASE_URL, DEFAULT_NFLVERSE_BASE_URL,
};
