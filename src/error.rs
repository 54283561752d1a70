use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Error type covering the different failure cases that can occur when the
/// tool fetches, transforms, or uploads survey data.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Wrapper for IO failures such as reading credentials or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level HTTP failures.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Raised when the source feed returns a page that cannot be interpreted
    /// as submissions. Aborts the whole run: no records means no sync.
    #[error("malformed feed page: {0}")]
    Fetch(String),

    /// Raised when a store read fails for a reason other than "not found".
    /// Aborts only the affected table.
    #[error("failed to read table '{table}': {message}")]
    TableLookup { table: String, message: String },

    /// Raised when creating a missing destination table fails.
    #[error("failed to create table '{table}': {message}")]
    TableCreate { table: String, message: String },

    /// Raised when appending rows to a destination table fails.
    #[error("failed to append rows to table '{table}': {message}")]
    Append { table: String, message: String },

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the configuration file is structurally valid JSON but
    /// semantically unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
