//! Error types for route configuration.

use thiserror::Error;

/// Errors raised while building the route table.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Invalid route method: {0}")]
    InvalidMethod(String),

    #[error("Unknown route type: {0}")]
    UnknownType(String),

    #[error("Invalid route pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The line does not have the `route <method> <pattern> <type> <target>` shape.
    #[error("Malformed route line: {0}")]
    MalformedLine(String),
}
