//! Structured errors for the swcache server.
//!
//! Engine failures convert through `swcache_core::Error`; these cover
//! problems that only exist at the tool boundary.

use rmcp::model::{ErrorCode, ErrorData as McpError};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Tool arguments could not be interpreted.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The worker dropped a reply or output could not be encoded.
    #[error("INTERNAL_ERROR: {0}")]
    Internal(String),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let code = match &err {
            ToolError::InvalidInput(_) => -32602,
            ToolError::Internal(_) => -32603,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
