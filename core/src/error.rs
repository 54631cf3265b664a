//! The single error kind enum surfaced by every component in the pipeline.
//!
//! Each component raises only the kind it originates; nothing upstream
//! reinterprets a caller's kind. The HTTP adapter is the only place that
//! maps a kind to a status code.

use thiserror::Error;

/// Failure produced anywhere in the request pipeline.
#[derive(Debug, Error, Clone)]
pub enum GatewayError {
    /// Validator rejection, bad projection mix, bad logicalOp, bad integer,
    /// unsafe character. Maps to HTTP 400.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Single-document lookup miss. Maps to HTTP 404.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// Collection-level "nothing at all" on a list endpoint. Sub-kind of
    /// not-found. Maps to HTTP 404.
    #[error("collection is empty: {0}")]
    ResourceEmpty(String),

    /// Driver/transport error not triggered by input. Maps to HTTP 500.
    #[error("store failure: {0}")]
    StoreFailure(String),

    /// Driver error whose signature matches a known input-triggered
    /// failure (null byte, bad regex, bad operator). Maps to HTTP 400.
    #[error("malformed store query: {0}")]
    MalformedStoreQuery(String),

    /// Catch-all for unanticipated failures. Maps to HTTP 500. Message is
    /// generic — never echoes internal detail to the caller.
    #[error("internal error")]
    Internal,
}

impl GatewayError {
    pub fn invalid_argument(param: impl Into<String>) -> Self {
        GatewayError::InvalidArgument(param.into())
    }

    /// Reclassify a raw store error message as `MalformedStoreQuery` when it
    /// carries one of the known input-triggered signatures (null byte, bad
    /// regex, bad operator), otherwise as a generic `StoreFailure`.
    pub fn from_store_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("null byte")
            || lower.contains("regex")
            || lower.contains("bad operator")
            || lower.contains("invalid operator")
        {
            GatewayError::MalformedStoreQuery(message)
        } else {
            GatewayError::StoreFailure(message)
        }
    }

    /// HTTP status code this kind maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::InvalidArgument(_) => 400,
            GatewayError::ResourceNotFound(_) => 404,
            GatewayError::ResourceEmpty(_) => 404,
            GatewayError::StoreFailure(_) => 500,
            GatewayError::MalformedStoreQuery(_) => 400,
            GatewayError::Internal => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
