//! Error types for readgraph
//!
//! Only caller and input errors are represented here. Broken internal
//! invariants are not errors: they panic.

use thiserror::Error;

/// Result type alias for readgraph operations
pub type Result<T> = std::result::Result<T, GraphError>;

/// Main error type for readgraph
#[derive(Error, Debug)]
pub enum GraphError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Input file parsing errors
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Malformed alignment strings
    #[error("Invalid CIGAR string: {0}")]
    InvalidCigar(String),

    /// A read name or handle that is not in the graph
    #[error("Unknown read: {0}")]
    UnknownRead(String),

    /// A read with an empty name or sequence
    #[error("Invalid read: {0}")]
    InvalidRead(String),

    /// A read name that was added twice
    #[error("Duplicate read: {0}")]
    DuplicateRead(String),

    /// An overlap record that is inconsistent with its reads or its alignment
    #[error("Invalid overlap: {0}")]
    InvalidOverlap(String),

    /// The graph no longer stores alternate sequences and cannot be extended
    #[error("Graph is frozen: alternate sequences have been stripped")]
    Frozen,

    /// Input files that do not exist
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::Serialization(err.to_string())
    }
}
