use crate::utils::error::{EtlError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

pub const PARQUET_EXTENSION: &str = ".parquet";
pub const NDJSON_EXTENSION: &str = ".ndjson";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub data: HashMap<String, serde_json::Value>,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&serde_json::Value> {
        self.data.get(column)
    }
}

/// 統一的表格結果：欄位順序 + 記錄
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl Table {
    pub fn new(columns: Vec<String>, records: Vec<Record>) -> Self {
        Self { columns, records }
    }

    /// Builds a table whose columns are the sorted union of all record keys.
    pub fn from_records(records: Vec<Record>) -> Self {
        let columns: Vec<String> = records
            .iter()
            .flat_map(|r| r.data.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Self { columns, records }
    }

    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetDescriptor {
    pub id: String,
    pub accepts_seasons: bool,
    pub expected_extension: String,
}

impl DatasetDescriptor {
    /// Provider table published as a Parquet artifact.
    pub fn tabular(id: impl Into<String>, accepts_seasons: bool) -> Self {
        Self {
            id: id.into(),
            accepts_seasons,
            expected_extension: PARQUET_EXTENSION.to_string(),
        }
    }

    /// Records published as a raw newline-delimited JSON artifact.
    pub fn records(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            accepts_seasons: false,
            expected_extension: NDJSON_EXTENSION.to_string(),
        }
    }

    pub fn is_tabular(&self) -> bool {
        self.expected_extension == PARQUET_EXTENSION
    }

    /// File name for raw artifacts, e.g. `nfl_fines.ndjson`.
    pub fn raw_filename(&self, source: &str) -> String {
        format!("{}_{}{}", source, self.id, self.expected_extension)
    }
}

/// Partition keys, kept sorted by key so path construction is order-independent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PartitionKeySet {
    keys: BTreeMap<String, String>,
}

impl PartitionKeySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl fmt::Display) {
        self.keys.insert(key.into(), value.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.keys.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromStr for PartitionKeySet {
    type Err = EtlError;

    /// Parses `season=2025` or `season=2025,week=3`.
    fn from_str(s: &str) -> Result<Self> {
        let mut set = PartitionKeySet::new();
        for pair in s.split(',').filter(|p| !p.trim().is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| EtlError::ValidationError {
                message: format!("partition key '{}' must look like key=value", pair),
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(EtlError::ValidationError {
                    message: format!("partition key '{}' has an empty name", pair),
                });
            }
            set.insert(key, value.trim());
        }
        Ok(set)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    Parquet,
    NewlineDelimitedJson,
    Csv,
}

impl SourceFormat {
    /// Suffix-exact inference; unknown or missing suffixes load as Parquet.
    pub fn from_uri(uri: &str) -> Self {
        let name = uri.rsplit('/').next().unwrap_or(uri);
        match name.rsplit_once('.').map(|(_, ext)| ext) {
            Some("parquet") => SourceFormat::Parquet,
            Some("ndjson") | Some("json") => SourceFormat::NewlineDelimitedJson,
            Some("csv") => SourceFormat::Csv,
            _ => SourceFormat::Parquet,
        }
    }

    /// BigQuery `sourceFormat` value.
    pub fn warehouse_name(&self) -> &'static str {
        match self {
            SourceFormat::Parquet => "PARQUET",
            SourceFormat::NewlineDelimitedJson => "NEWLINE_DELIMITED_JSON",
            SourceFormat::Csv => "CSV",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    Append,
    #[default]
    #[serde(alias = "truncate")]
    Replace,
}

impl WriteMode {
    pub fn write_disposition(&self) -> &'static str {
        match self {
            WriteMode::Append => "WRITE_APPEND",
            WriteMode::Replace => "WRITE_TRUNCATE",
        }
    }

    /// clap value parser
    pub fn parse_arg(s: &str) -> std::result::Result<Self, String> {
        s.parse().map_err(|e: EtlError| e.to_string())
    }
}

impl FromStr for WriteMode {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "append" => Ok(WriteMode::Append),
            "replace" | "truncate" => Ok(WriteMode::Replace),
            other => Err(EtlError::ValidationError {
                message: format!(
                    "unsupported write mode '{}' (expected append, replace or truncate)",
                    other
                ),
            }),
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::Append => write!(f, "append"),
            WriteMode::Replace => write!(f, "replace"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableTarget {
    pub project: String,
    pub warehouse_dataset: String,
    pub table_name: String,
}

impl TableTarget {
    pub fn new(
        project: impl Into<String>,
        warehouse_dataset: impl Into<String>,
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            warehouse_dataset: warehouse_dataset.into(),
            table_name: table_name.into(),
        }
    }

    /// Raw-layer table for a dataset id: the table is named after the dataset.
    pub fn for_dataset(project: &str, warehouse_dataset: &str, data_type: &str) -> Self {
        Self::new(project, warehouse_dataset, data_type)
    }
}

impl fmt::Display for TableTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.warehouse_dataset, self.table_name)
    }
}

impl FromStr for TableTarget {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            [project, dataset, table] if parts.iter().all(|p| !p.is_empty()) => {
                Ok(TableTarget::new(*project, *dataset, *table))
            }
            _ => Err(EtlError::ValidationError {
                message: format!("table id '{}' must be project.dataset.table", s),
            }),
        }
    }
}

/// One immutable file in the raw zone.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub uri: String,
    pub dataset_id: String,
    pub partition_keys: PartitionKeySet,
    pub created_at: DateTime<Utc>,
    pub format: SourceFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub name: String,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_inference_is_suffix_exact() {
        let cases = [
            ("gs://b/raw/nfl/pbp/2025-01-01_00-00-00.parquet", SourceFormat::Parquet),
            ("gs://b/raw/nfl/fines/ts/nfl_fines.ndjson", SourceFormat::NewlineDelimitedJson),
            ("gs://b/raw/nfl/fines/export.json", SourceFormat::NewlineDelimitedJson),
            ("gs://b/raw/nfl/games.csv", SourceFormat::Csv),
            ("gs://b/raw/nfl/games.csv.gz", SourceFormat::Parquet),
            ("gs://b/raw/nfl/no_suffix", SourceFormat::Parquet),
            ("gs://b/raw/nfl.v2/no_suffix", SourceFormat::Parquet),
            ("gs://b/raw/nfl/UPPER.CSV", SourceFormat::Parquet),
        ];
        for (uri, expected) in cases {
            assert_eq!(SourceFormat::from_uri(uri), expected, "{}", uri);
        }
    }

    #[test]
    fn test_write_mode_parsing() {
        assert_eq!("append".parse::<WriteMode>().unwrap(), WriteMode::Append);
        assert_eq!("replace".parse::<WriteMode>().unwrap(), WriteMode::Replace);
        assert_eq!("TRUNCATE".parse::<WriteMode>().unwrap(), WriteMode::Replace);
        assert!("upsert".parse::<WriteMode>().is_err());
        assert_eq!(WriteMode::Replace.write_disposition(), "WRITE_TRUNCATE");
        assert_eq!(WriteMode::Append.write_disposition(), "WRITE_APPEND");
    }

    #[test]
    fn test_table_target_round_trips_through_identifier() {
        let target = TableTarget::for_dataset("my-project", "nfl_raw", "teams");
        assert_eq!(target.to_string(), "my-project.nfl_raw.teams");
        assert_eq!("my-project.nfl_raw.teams".parse::<TableTarget>().unwrap(), target);
        assert!("nfl_raw.teams".parse::<TableTarget>().is_err());
        assert!("a..c".parse::<TableTarget>().is_err());
    }

    #[test]
    fn test_partition_keys_parse_and_sort() {
        let keys: PartitionKeySet = "week=3,season=2025".parse().unwrap();
        let pairs: Vec<_> = keys.iter().collect();
        assert_eq!(pairs, vec![("season", "2025"), ("week", "3")]);
        assert!("season".parse::<PartitionKeySet>().is_err());
        assert!("".parse::<PartitionKeySet>().unwrap().is_empty());
    }

    #[test]
    fn test_descriptor_raw_filename() {
        let fines = DatasetDescriptor::records("fines");
        assert!(!fines.is_tabular());
        assert_eq!(fines.raw_filename("nfl"), "nfl_fines.ndjson");
        assert!(DatasetDescriptor::tabular("teams", false).is_tabular());
    }
}
