use crate::domain::model::{Record, Table};
use crate::domain::ports::DatasetAdapter;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;

pub const DEFAULT_NFLVERSE_BASE_URL: &str =
    "https://github.com/nflverse/nflverse-data/releases/download";
/// ffopportunity expected-points releases
pub const DEFAULT_FFOPPORTUNITY_BASE_URL: &str =
    "https://github.com/ffverse/ffopportunity/releases/download";
/// DynastyProcess player ids and FantasyPros rankings
pub const DEFAULT_DYNASTYPROCESS_BASE_URL: &str = "https://github.com/dynastyprocess/data/raw/master";
/// nfldata repository files (trades)
pub const DEFAULT_NFLDATA_BASE_URL: &str = "https://github.com/nflverse/nfldata/raw/master";

/// Where a dataset's CSV assets live under its base URL. `tag` is the release
/// tag for release downloads, or the directory for raw repository files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLayout {
    /// One asset per season: `{tag}/{stem}_{season}.csv`.
    PerSeason { tag: &'static str, stem: &'static str },
    /// One asset for all seasons: `{tag}/{file}`, optionally filtered on a season column.
    Single {
        tag: &'static str,
        file: &'static str,
        season_column: Option<&'static str>,
    },
}

/// CSV asset adapter for one nflverse-family dataset.
#[derive(Debug, Clone)]
pub struct NflverseAdapter {
    client: Client,
    base_url: String,
    layout: AssetLayout,
}

impl NflverseAdapter {
    pub fn new(client: Client, base_url: impl Into<String>, layout: AssetLayout) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            layout,
        }
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let url = format!("{}/{}", self.base_url, path);
        tracing::debug!("🌐 GET {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EtlError::processing(format!(
                "asset {} responded {}",
                url, status
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl DatasetAdapter for NflverseAdapter {
    async fn fetch(&self, seasons: Option<&[u16]>) -> Result<Table> {
        match (&self.layout, seasons) {
            (AssetLayout::PerSeason { tag, stem }, Some(seasons)) => {
                let mut table = Table::default();
                for season in seasons {
                    let body = self
                        .download(&format!("{}/{}_{}.csv", tag, stem, season))
                        .await?;
                    append_table(&mut table, parse_csv(&body)?);
                }
                Ok(table)
            }
            (AssetLayout::PerSeason { tag, .. }, None) => Err(EtlError::processing(format!(
                "nflverse release '{}' is published per season and needs at least one",
                tag
            ))),
            (
                AssetLayout::Single {
                    tag,
                    file,
                    season_column,
                },
                seasons,
            ) => {
                let body = self.download(&format!("{}/{}", tag, file)).await?;
                let mut table = parse_csv(&body)?;
                if let (Some(column), Some(seasons)) = (season_column, seasons) {
                    table.records.retain(|r| {
                        r.get(column)
                            .and_then(Value::as_i64)
                            .is_some_and(|s| seasons.iter().any(|want| i64::from(*want) == s))
                    });
                }
                Ok(table)
            }
        }
    }
}

/// Appends rows; columns are the union in first-seen order.
fn append_table(target: &mut Table, other: Table) {
    for column in other.columns {
        if !target.columns.contains(&column) {
            target.columns.push(column);
        }
    }
    target.records.extend(other.records);
}

/// Parses a CSV body with a header row, keeping the header's column order.
pub fn parse_csv(body: &[u8]) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body);

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut records = Vec::new();

    for row in reader.records() {
        let row = row?;
        let data: HashMap<String, Value> = columns
            .iter()
            .zip(row.iter())
            .map(|(column, raw)| (column.clone(), infer_scalar(raw)))
            .collect();
        records.push(Record { data });
    }

    Ok(Table::new(columns, records))
}

/// R-style CSV cell to JSON: `NA` and empty are null.
pub fn infer_scalar(raw: &str) -> Value {
    let raw = raw.trim();
    match raw {
        "" | "NA" => return Value::Null,
        "TRUE" | "true" => return Value::Bool(true),
        "FALSE" | "false" => return Value::Bool(false),
        _ => {}
    }

    // ids like "00-0033873" or zip-style "0042" stay text
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    let leading_zero = digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.");
    if leading_zero {
        return Value::String(raw.to_string());
    }

    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    if raw.chars().all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')) {
        if let Some(n) = raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
        {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_string())
}
