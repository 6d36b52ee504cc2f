//! Error types for the descriptor model.

use thiserror::Error;

/// Result type alias using ModelError.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised by descriptor parsing and table construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Malformed descriptor '{text}': {reason}")]
    MalformedDescriptor { text: String, reason: String },

    #[error("Descriptor field out of range: f={f} x={x} y={y}")]
    FieldRange { f: u32, x: u32, y: u32 },

    #[error("Sequence child appended outside an open sequence")]
    NoOpenSequence,
}
