//! HTTP request parsing.
//!
//! Turns the raw bytes read from a connection into an [`HttpRequest`]. Anything
//! that fails here is answered with `400 Bad Request` before dispatch.

mod request;
mod method;
mod version;
mod error;
mod tests;

// Re-export public items
pub use request::HttpRequest;
pub use method::Method;
pub use version::HttpVersion;
pub use error::Error;

pub use request::{expected_length, parse_request};
