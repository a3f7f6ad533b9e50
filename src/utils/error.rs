use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unknown data_type '{data_type}'. Available types: {}", .available.join(", "))]
    UnknownDatasetError {
        data_type: String,
        available: Vec<String>,
    },

    #[error("Extraction of '{data_type}' failed: {source}")]
    ExtractionError {
        data_type: String,
        #[source]
        source: Box<EtlError>,
    },

    #[error("Write to '{uri}' failed: {message}")]
    WriteError { uri: String, message: String },

    #[error("No {extension} file found under {prefix}")]
    ArtifactNotFoundError { prefix: String, extension: String },

    #[error("Load into {table} failed: {message}")]
    LoadError { table: String, message: String },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn config(message: impl Into<String>) -> Self {
        EtlError::ConfigurationError {
            message: message.into(),
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        EtlError::ProcessingError {
            message: message.into(),
        }
    }

    /// 錯誤嚴重程度，CLI 依此決定退出碼
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EtlError::ConfigurationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::UnknownDatasetError { .. } => ErrorSeverity::Critical,
            EtlError::ArtifactNotFoundError { .. } | EtlError::ValidationError { .. } => {
                ErrorSeverity::High
            }
            EtlError::ExtractionError { source, .. } => match source.severity() {
                ErrorSeverity::Critical => ErrorSeverity::Critical,
                _ => ErrorSeverity::Medium,
            },
            EtlError::WriteError { .. }
            | EtlError::LoadError { .. }
            | EtlError::ApiError(_)
            | EtlError::IoError(_) => ErrorSeverity::Medium,
            EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::ParquetError(_)
            | EtlError::ArrowError(_)
            | EtlError::ProcessingError { .. } => ErrorSeverity::High,
        }
    }

    /// Whether the outermost caller may retry the failed unit of work.
    pub fn is_retryable(&self) -> bool {
        self.severity() == ErrorSeverity::Medium
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::ConfigurationError { .. } | EtlError::InvalidConfigValueError { .. } => {
                "Check the environment variables or the TOML configuration file"
            }
            EtlError::UnknownDatasetError { .. } => {
                "Run `nfl-etl datasets` to list the registered dataset ids"
            }
            EtlError::ExtractionError { .. } | EtlError::ApiError(_) => {
                "The provider may be unavailable; retry later or check the provider URL"
            }
            EtlError::WriteError { .. } => {
                "Check object-store credentials, bucket name and quota"
            }
            EtlError::ArtifactNotFoundError { .. } => {
                "Run the extract step for this dataset before loading"
            }
            EtlError::LoadError { .. } => {
                "Inspect the load job errors in the warehouse; the artifact may be malformed"
            }
            EtlError::IoError(_) => "Check file permissions and available disk space",
            _ => "Inspect the logs for the failing dataset and retry",
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
