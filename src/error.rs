use thiserror::Error;

#[derive(Error, Debug)]
pub enum MerchantError {
    #[error("Unknown merchant '{0}'")]
    NotFound(String),
    #[error("Corrupt data at {location}: {source}")]
    CorruptData {
        location: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),
    #[error("Invalid internal id '{0}'")]
    InvalidId(String),
    #[error("Invalid callback: {0}")]
    InvalidCallback(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Gateway error: {0}")]
    GatewayError(String),
    #[error("Storage error: {0}")]
    StorageError(Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, MerchantError>;
