use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AppError {
    UnsupportedFormat(String),
    MalformedInput(String),
    SizeExceeded(String),
    MaterializationError(String),
    NotFound(String),
    InvalidQuery(String),
    DatabaseError(String),
    IoError(String),
}

impl AppError {
    /// Machine-readable kind, stable across message wording changes.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::UnsupportedFormat(_) => "unsupported_format",
            AppError::MalformedInput(_) => "malformed_input",
            AppError::SizeExceeded(_) => "size_exceeded",
            AppError::MaterializationError(_) => "materialization_error",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidQuery(_) => "invalid_query",
            AppError::DatabaseError(_) => "database_error",
            AppError::IoError(_) => "io_error",
        }
    }

    /// HTTP status classification: client errors are 4xx, the rest 5xx.
    pub fn status(&self) -> u16 {
        match self {
            AppError::NotFound(_) => 404,
            AppError::InvalidQuery(_) => 400,
            _ => 500,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            AppError::MalformedInput(msg) => write!(f, "Malformed input: {}", msg),
            AppError::SizeExceeded(msg) => write!(f, "File too big: {}", msg),
            AppError::MaterializationError(msg) => write!(f, "Materialization error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::InvalidQuery(msg) => write!(f, "Invalid query: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
