use crate::domain::model::{PartitionKeySet, WriteMode};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "nfl-etl")]
#[command(about = "Extract NFL datasets into the raw zone and load them into the warehouse")]
#[command(version)]
pub struct Cli {
    /// TOML configuration file; environment variables (and .env) are used when omitted
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, short, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[arg(long, global = true, help = "Log process CPU and memory per phase")]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the registered datasets
    Datasets,

    /// Extract a dataset and write it to the raw zone
    Extract {
        data_type: String,

        #[arg(long = "season")]
        seasons: Vec<u16>,

        /// Extra partition key, e.g. --partition season=2025
        #[arg(long = "partition", value_parser = parse_partition)]
        partitions: Vec<PartitionKeySet>,

        /// Write under a local directory instead of the bucket
        #[arg(long)]
        local_dir: Option<PathBuf>,
    },

    /// Load the newest (or a given) artifact into the warehouse
    Load {
        data_type: String,

        #[arg(long)]
        uri: Option<String>,

        #[arg(long = "partition", value_parser = parse_partition)]
        partitions: Vec<PartitionKeySet>,

        #[arg(long, default_value = "replace", value_parser = WriteMode::parse_arg)]
        write_mode: WriteMode,
    },

    /// Extract, write and load one dataset
    Run {
        data_type: String,

        #[arg(long = "season")]
        seasons: Vec<u16>,

        #[arg(long, default_value = "replace", value_parser = WriteMode::parse_arg)]
        write_mode: WriteMode,
    },

    /// Run several datasets in sequence, continuing past failures
    RunAll {
        #[arg(long = "season")]
        seasons: Vec<u16>,

        /// Comma-separated dataset ids; all registered datasets when omitted
        #[arg(long, value_delimiter = ',')]
        datasets: Vec<String>,
    },
}

fn parse_partition(s: &str) -> std::result::Result<PartitionKeySet, String> {
    s.parse().map_err(|e: crate::utils::error::EtlError| e.to_string())
}

/// Merges repeated `--partition` flags into one key set.
pub fn merge_partitions(partitions: &[PartitionKeySet]) -> PartitionKeySet {
    let mut merged = PartitionKeySet::new();
    for set in partitions {
        for (key, value) in set.iter() {
            merged.insert(key, value);
        }
    }
    merged
}

/// `None` when no `--season` was given.
pub fn seasons_arg(seasons: &[u16]) -> Option<&[u16]> {
    (!seasons.is_empty()).then_some(seasons)
}
