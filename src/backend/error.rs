//! Error types for backend adapters.

use thiserror::Error;

use crate::server::StatusCode;

/// Why an adapter could not produce a response.
///
/// The dispatcher turns each variant into an error response with
/// [`AdapterError::status`] and the error text as body.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The file, script, or module the route points at does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The target escapes the document root.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The backend ran but failed: interpreter error, loader error, query
    /// failure, pipe setup failure.
    #[error("{0}")]
    Execution(String),

    /// The backend exceeded its configured deadline.
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl AdapterError {
    pub fn status(&self) -> StatusCode {
        match self {
            AdapterError::NotFound(_) => StatusCode::NotFound,
            AdapterError::Forbidden(_) => StatusCode::Forbidden,
            AdapterError::Execution(_) => StatusCode::InternalServerError,
            AdapterError::Timeout(_) => StatusCode::GatewayTimeout,
        }
    }
}

impl From<tokio::task::JoinError> for AdapterError {
    fn from(err: tokio::task::JoinError) -> Self {
        AdapterError::Execution(format!("Backend task failed: {err}"))
    }
}

/// Errors from the native module loader.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("{0}")]
    Load(String),

    #[error("Symbol {0} not found")]
    SymbolNotFound(String),
}
