//! Error types for the HTTP server.

use thiserror::Error;

use crate::parser::Error as ParserError;
use crate::router::RouteError;

/// Errors that can occur while configuring or running the server.
#[derive(Debug, Error)]
pub enum Error {
    /// Error parsing an HTTP request.
    #[error("Parse error: {0}")]
    ParseError(#[from] ParserError),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A route definition was rejected.
    #[error("Route error: {0}")]
    RouteError(#[from] RouteError),

    /// A configuration file line could not be applied.
    #[error("Configuration error on line {line}: {message}")]
    Config { line: usize, message: String },

    /// The request grew past the configured size limit.
    #[error("Request exceeds {0} bytes")]
    RequestTooLarge(usize),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
