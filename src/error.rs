use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Could not load snapshot from {path}: {message}")]
    SnapshotLoad { path: String, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    UrlParse(String),

    #[error("Invalid period format: {0}")]
    PeriodParse(String),

    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
