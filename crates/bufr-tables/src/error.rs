//! Error types for the table registry.
//!
//! Only structural failures surface here: a location that cannot be opened,
//! a stream that cannot be read, a format tag nobody recognizes, or an XML
//! document that does not parse. Malformed individual records are not
//! errors; parsers skip them and report line diagnostics instead.

use thiserror::Error;

/// Result type alias using TableError.
pub type TableResult<T> = Result<T, TableError>;

/// Errors that can occur while loading and routing tables.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Failed to read table stream: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown table format: {0}")]
    UnknownFormat(String),

    #[error("Malformed XML in {location}: {message}")]
    Xml { location: String, message: String },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}
