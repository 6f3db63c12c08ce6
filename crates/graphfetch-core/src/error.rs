//! Error types for Graphfetch

use thiserror::Error;

/// Result type alias using Graphfetch's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Graphfetch error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Network errors (E100-E199)
    #[error("Network error: {0}. Check that the triple store endpoint is reachable.")]
    NetworkError(#[from] reqwest::Error),

    #[error("Triple store error: {0}")]
    StoreError(String),

    #[error("Malformed store response: {0}")]
    MalformedResponse(String),

    #[error("Batch timed out after {0} seconds")]
    BatchTimeout(u64),

    // Cache errors (E400-E499)
    #[error("Cache error: {0}")]
    CacheError(String),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Please supply one or more ids")]
    EmptyIdList,

    // Generic errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::NetworkError(_) => "E100",
            Self::StoreError(_) => "E101",
            Self::MalformedResponse(_) => "E102",
            Self::BatchTimeout(_) => "E103",
            Self::CacheError(_) => "E400",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::EmptyIdList => "E801",
            Self::Serialization(_) => "E900",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::NetworkError(_) | Self::StoreError(_) => {
                Some("graphfetch config get store.endpoint".to_string())
            }
            Self::BatchTimeout(secs) => Some(format!(
                "graphfetch config set traversal.batch_timeout_secs {}",
                secs * 2
            )),
            Self::CacheError(_) => Some("graphfetch fetch --no-cache".to_string()),
            Self::ConfigError(_) => Some("graphfetch config list".to_string()),
            Self::EmptyIdList => Some("graphfetch fetch <id>[,<id>...] --type <type>".to_string()),
            _ => None,
        }
    }

    /// Whether the error is a transient store failure.
    ///
    /// Transient failures are absorbed by the traversal and never reach the
    /// caller of `fetch`.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NetworkError(_)
                | Self::StoreError(_)
                | Self::MalformedResponse(_)
                | Self::BatchTimeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_id_list_error() {
        let error = Error::EmptyIdList;
        assert_eq!(error.code(), "E801");
        assert!(error.suggestion().is_some());
        assert!(!error.is_transient());
    }

    #[test]
    fn test_batch_timeout_error() {
        let error = Error::BatchTimeout(30);
        assert_eq!(error.code(), "E103");
        assert_eq!(
            error.suggestion(),
            Some("graphfetch config set traversal.batch_timeout_secs 60".to_string())
        );
        assert!(error.to_string().contains("30"));
        assert!(error.is_transient());
    }

    #[test]
    fn test_store_error_is_transient() {
        let error = Error::StoreError("503 Service Unavailable".to_string());
        assert_eq!(error.code(), "E101");
        assert!(error.is_transient());
        assert!(error.to_string().contains("503"));
    }

    #[test]
    fn test_cache_error_is_hard() {
        let error = Error::CacheError("disk full".to_string());
        assert_eq!(error.code(), "E400");
        assert!(!error.is_transient());
    }

    #[test]
    fn test_serialization_error_from() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: Error = err.into();
        assert_eq!(error.code(), "E900");
    }

    #[test]
    fn test_io_error_from() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error: Error = io.into();
        assert_eq!(error.code(), "E9999");
        assert_eq!(error.suggestion(), None);
    }
}
