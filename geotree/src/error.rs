//! Error and result types for spatial index operations.

use std::io;
use thiserror::Error;

/// Errors that can occur in spatial indexing operations
#[derive(Debug, Error)]
pub enum SpatialError {
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not indexed in this tree: {0}")]
    NotIndexed(String),

    #[error("Corrupt tree: {0}")]
    CorruptTree(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store is closed")]
    Closed,
}

/// Result type for spatial operations
pub type SpatialResult<T> = Result<T, SpatialError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: SpatialError = io_err.into();
        assert!(matches!(err, SpatialError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_display() {
        let err = SpatialError::NotFound("record 42".to_string());
        assert_eq!(err.to_string(), "Not found: record 42");

        let err = SpatialError::CorruptTree("node 7 has no slot".to_string());
        assert!(err.to_string().starts_with("Corrupt tree"));
    }
}
