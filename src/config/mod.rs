#[cfg(feature = "cli")]
pub mod cli;

use crate::adapters::providers::{
    DEFAULT_DYNASTYPROCESS_BASE_URL, DEFAULT_FFOPPORTUNITY_BASE_URL, DEFAULT_FINES_URL,
    DEFAULT_NFLDATA_BASE_URL, DEFAULT_NFLVERSE_BASE_URL,
};
use crate::adapters::storage::DEFAULT_GCS_ENDPOINT;
use crate::adapters::warehouse::DEFAULT_BIGQUERY_ENDPOINT;
use crate::core::extractor::season_for;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use chrono::Utc;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub gcp: GcpConfig,
    pub storage: StorageConfig,
    pub warehouse: WarehouseConfig,
    pub ingestion: IngestionConfig,
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcpConfig {
    pub project_id: String,
    pub location: String,
    pub access_token: Option<String>,
    pub credentials_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub raw_bucket: String,
    pub endpoint: String,
}

/// 倉儲資料集 (raw / staging / analytics / ml)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub raw_dataset: String,
    pub staging_dataset: String,
    pub analytics_dataset: String,
    pub ml_dataset: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    /// Falls back to the season of today's date.
    pub current_season: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub source: String,
    pub nflverse_base_url: String,
    pub ffopportunity_base_url: String,
    pub dynastyprocess_base_url: String,
    pub nfldata_base_url: String,
    pub fines_url: String,
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            location: "US".to_string(),
            access_token: None,
            credentials_path: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            raw_bucket: String::new(),
            endpoint: DEFAULT_GCS_ENDPOINT.to_string(),
        }
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            raw_dataset: "nfl_raw".to_string(),
            staging_dataset: "nfl_staging".to_string(),
            analytics_dataset: "nfl_analytics".to_string(),
            ml_dataset: "nfl_ml".to_string(),
            endpoint: DEFAULT_BIGQUERY_ENDPOINT.to_string(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            batch_size: 10_000,
            max_retries: 3,
            retry_delay_seconds: 5,
            current_season: None,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            source: "nfl".to_string(),
            nflverse_base_url: DEFAULT_NFLVERSE_BASE_URL.to_string(),
            ffopportunity_base_url: DEFAULT_FFOPPORTUNITY_BASE_URL.to_string(),
            dynastyprocess_base_url: DEFAULT_DYNASTYPROCESS_BASE_URL.to_string(),
            nfldata_base_url: DEFAULT_NFLDATA_BASE_URL.to_string(),
            fines_url: DEFAULT_FINES_URL.to_string(),
        }
    }
}

fn parse_var<T: FromStr>(name: &str, raw: Option<String>, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) if !value.trim().is_empty() => {
            value
                .trim()
                .parse()
                .map_err(|e: T::Err| EtlError::InvalidConfigValueError {
                    field: name.to_string(),
                    value: value.clone(),
                    reason: e.to_string(),
                })
        }
        _ => Ok(default),
    }
}

impl AppConfig {
    /// 從環境變數載入 (先讀 .env)
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(EtlError::config(format!(".env could not be read: {}", e)));
            }
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from a variable lookup; unset variables keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(project_id) = lookup("GCP_PROJECT_ID") {
            config.gcp.project_id = project_id;
        }
        if let Some(bucket) = lookup("GCS_RAW_BUCKET") {
            config.storage.raw_bucket = bucket;
        }
        if let Some(location) = lookup("GCP_LOCATION") {
            config.gcp.location = location;
        }
        config.gcp.access_token = lookup("GCP_ACCESS_TOKEN").filter(|t| !t.is_empty());
        config.gcp.credentials_path = lookup("GOOGLE_APPLICATION_CREDENTIALS");

        config.ingestion.batch_size = parse_var(
            "INGESTION_BATCH_SIZE",
            lookup("INGESTION_BATCH_SIZE"),
            config.ingestion.batch_size,
        )?;
        config.ingestion.max_retries = parse_var(
            "INGESTION_MAX_RETRIES",
            lookup("INGESTION_MAX_RETRIES"),
            config.ingestion.max_retries,
        )?;
        config.ingestion.retry_delay_seconds = parse_var(
            "INGESTION_RETRY_DELAY",
            lookup("INGESTION_RETRY_DELAY"),
            config.ingestion.retry_delay_seconds,
        )?;
        config.ingestion.current_season = parse_var(
            "NFL_CURRENT_SEASON",
            lookup("NFL_CURRENT_SEASON"),
            0u16,
        )
        .map(|season| (season > 0).then_some(season))?;

        if let Some(url) = lookup("NFLVERSE_BASE_URL") {
            config.sources.nflverse_base_url = url;
        }
        if let Some(url) = lookup("FFOPPORTUNITY_BASE_URL") {
            config.sources.ffopportunity_base_url = url;
        }
        if let Some(url) = lookup("DYNASTYPROCESS_BASE_URL") {
            config.sources.dynastyprocess_base_url = url;
        }
        if let Some(url) = lookup("NFLDATA_BASE_URL") {
            config.sources.nfldata_base_url = url;
        }
        if let Some(url) = lookup("NFL_FINES_URL") {
            config.sources.fines_url = url;
        }
        if let Some(endpoint) = lookup("GCS_ENDPOINT") {
            config.storage.endpoint = endpoint;
        }
        if let Some(endpoint) = lookup("BIGQUERY_ENDPOINT") {
            config.warehouse.endpoint = endpoint;
        }

        Ok(config)
    }

    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置，支援 ${VAR} 環境變數替換
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content)?;
        toml::from_str(&processed)
            .map_err(|e| EtlError::config(format!("TOML parsing error: {}", e)))
    }

    pub fn current_season(&self) -> u16 {
        self.ingestion
            .current_season
            .unwrap_or_else(|| season_for(Utc::now()))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.ingestion.retry_delay_seconds)
    }

    /// Bearer token for GCS and BigQuery. `GCP_ACCESS_TOKEN` wins; otherwise one
    /// is requested with the service-account key at `credentials_path`.
    pub async fn resolve_access_token(&self) -> Result<Option<String>> {
        if let Some(token) = &self.gcp.access_token {
            return Ok(Some(token.clone()));
        }
        let Some(path) = &self.gcp.credentials_path else {
            tracing::warn!("⚠️ No GCP credentials configured, requests are unauthenticated");
            return Ok(None);
        };

        let account = CustomServiceAccount::from_file(path).map_err(|e| {
            EtlError::config(format!("service account key {} is unusable: {}", path, e))
        })?;
        let token = account
            .token(&[CLOUD_PLATFORM_SCOPE])
            .await
            .map_err(|e| EtlError::processing(format!("token request with {} failed: {}", path, e)))?;

        tracing::debug!("🔑 Access token issued for the key at {}", path);
        Ok(Some(token.as_str().to_string()))
    }
}

/// 替換環境變數 (例如 ${GCP_ACCESS_TOKEN})；未設定的變數原樣保留
fn substitute_env_vars(content: &str) -> Result<String> {
    use regex::Regex;
    let re = Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| EtlError::config(format!("substitution pattern: {}", e)))?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.into_owned())
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_required("GCP_PROJECT_ID", &self.gcp.project_id)?;
        validation::validate_required("GCS_RAW_BUCKET", &self.storage.raw_bucket)?;
        validation::validate_gcs_bucket_name("storage.raw_bucket", &self.storage.raw_bucket)?;
        validation::validate_non_empty_string("gcp.location", &self.gcp.location)?;

        validation::validate_url("storage.endpoint", &self.storage.endpoint)?;
        validation::validate_url("warehouse.endpoint", &self.warehouse.endpoint)?;
        for (field, url) in [
            ("sources.nflverse_base_url", &self.sources.nflverse_base_url),
            ("sources.ffopportunity_base_url", &self.sources.ffopportunity_base_url),
            ("sources.dynastyprocess_base_url", &self.sources.dynastyprocess_base_url),
            ("sources.nfldata_base_url", &self.sources.nfldata_base_url),
            ("sources.fines_url", &self.sources.fines_url),
        ] {
            validation::validate_url(field, url)?;
        }

        for (field, dataset) in [
            ("warehouse.raw_dataset", &self.warehouse.raw_dataset),
            ("warehouse.staging_dataset", &self.warehouse.staging_dataset),
            ("warehouse.analytics_dataset", &self.warehouse.analytics_dataset),
            ("warehouse.ml_dataset", &self.warehouse.ml_dataset),
        ] {
            validation::validate_identifier(field, dataset)?;
        }
        validation::validate_identifier("sources.source", &self.sources.source)?;

        validation::validate_positive_number("ingestion.batch_size", self.ingestion.batch_size, 1)?;
        validation::validate_range("ingestion.max_retries", self.ingestion.max_retries, 0, 10)?;

        if let Some(path) = &self.gcp.credentials_path {
            validation::validate_path("gcp.credentials_path", path)?;
        }

        Ok(())
    }
}
