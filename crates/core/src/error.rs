//! Unified error types for the cache engine.
//!
//! Every message carries a stable code prefix so callers and the MCP host can
//! classify failures without matching on variants.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error type for swcache.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// URL could not be parsed or resolved.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Route pattern failed to compile.
    #[error("INVALID_PATTERN: {0}")]
    InvalidPattern(String),

    /// Fetch was rejected before a response arrived.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Origin answered with a non-success status.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Fetch timed out.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Response body exceeded the configured limit.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Precache manifest could not be fetched or parsed.
    #[error("MANIFEST_ERROR: {0}")]
    Manifest(String),

    /// Partition or TTL store operation failed.
    #[error("STORAGE_ERROR: {0}")]
    Storage(String),

    /// SQLite operation failed.
    #[error("STORAGE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORAGE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Lifecycle operation not allowed in the current worker state.
    #[error("INVALID_STATE: cannot {operation} while {state}")]
    InvalidState { state: String, operation: String },

    /// No cache entry found for the given key.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),
}

impl Error {
    /// Whether this error means "the network did not produce a usable response".
    ///
    /// These are the failures that strategies may recover from with a cached
    /// fallback.
    pub fn is_network_failure(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::HttpError(_) | Error::FetchTimeout(_) | Error::FetchTooLarge(_)
        )
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Storage(format!("serialization failed: {err}"))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidInput(_) | Error::InvalidUrl(_) | Error::InvalidPattern(_) => -32602,
            Error::Network(_) => -32003,
            Error::HttpError(_) => -32008,
            Error::FetchTimeout(_) => -32006,
            Error::FetchTooLarge(_) => -32007,
            Error::Manifest(_) => -32010,
            Error::Storage(_) | Error::Database(_) | Error::MigrationFailed(_) => -32002,
            Error::InvalidState { .. } => -32011,
            Error::CacheMiss(_) => -32001,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::CacheMiss("https://example.com/app.js".to_string());
        assert!(err.to_string().contains("CACHE_MISS"));
        assert!(err.to_string().contains("app.js"));
    }

    #[test]
    fn test_invalid_state_display() {
        let err = Error::InvalidState { state: "active".into(), operation: "install".into() };
        assert_eq!(err.to_string(), "INVALID_STATE: cannot install while active");
    }

    #[test]
    fn test_network_failure_classification() {
        assert!(Error::Network("refused".into()).is_network_failure());
        assert!(Error::HttpError("status 503".into()).is_network_failure());
        assert!(Error::FetchTimeout("10s".into()).is_network_failure());
        assert!(!Error::Storage("quota".into()).is_network_failure());
        assert!(!Error::Manifest("bad json".into()).is_network_failure());
    }

    #[test]
    fn test_error_to_mcp_error() {
        let err = Error::CacheMiss("abc".to_string());
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32001);

        let mcp_err: McpError = Error::Network("offline".into()).into();
        assert_eq!(mcp_err.code.0, -32003);
    }
}
