//! HTTP server implementation for sera.
//!
//! The server owns the listener and the connection tasks. Each connection
//! carries one request, which is handed to the dispatcher.

mod response;
mod config;
mod error;
mod http_server;
mod tests;

pub use response::{HttpResponse, StatusCode};
pub use config::ServerConfig;
pub use error::Error;
pub use http_server::HttpServer;
