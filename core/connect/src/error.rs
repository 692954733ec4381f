//! FILENAME: core/connect/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("input was empty")]
    EmptyInput,

    #[error("CSV parse error at line {row}: {reason}")]
    Csv { row: u64, reason: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data shape: {0}")]
    InvalidShape(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
