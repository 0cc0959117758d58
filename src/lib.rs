//! A small HTTP server that routes requests to pluggable backends.
//!
//! Requests are matched against a table of route patterns. The matching route
//! names a backend and a target, and the dispatcher runs that backend:
//!
//! - an embedded Rhai scripting engine with persistent state,
//! - CGI-style subprocesses (`php`, `ruby`, or any configured interpreter),
//! - native modules loaded from shared libraries,
//! - SQLite database files,
//! - static files,
//! - internal forwards to another path.
//!
//! Paths that no route matches fall back to a backend chosen by file
//! extension, and finally to the static file responder.
//!
//! # Examples
//!
//! ## Parsing a request
//!
//! ```
//! use sera::parse_request;
//!
//! let request = parse_request(b"GET /users/42?full=1 HTTP/1.1\r\nHost: example.com\r\n\r\n").unwrap();
//! assert_eq!(request.path, "/users/42");
//! assert_eq!(request.get_query_param("full"), Some("1"));
//! ```
//!
//! ## Matching paths
//!
//! ```
//! use sera::router::match_path;
//!
//! let result = match_path("/users/:id", "/users/42");
//! assert!(result.matched);
//! assert_eq!(result.params.get("id"), Some("42"));
//!
//! assert!(match_path("/files/*", "/files/a/b.txt").matched);
//! assert!(!match_path("/users/:id", "/users/").matched);
//! ```
//!
//! ## Running a server
//!
//! ```no_run
//! use sera::{HttpServer, ServerConfig};
//!
//! # async fn run() -> Result<(), sera::ServerError> {
//! let config = ServerConfig::default()
//!     .with_route("route GET /users/:id rhai users.rhai")?
//!     .with_route("route * /old/:id forward /users/:id")?;
//!
//! HttpServer::new(config).start().await
//! # }
//! ```

pub mod backend;
pub mod dispatcher;
pub mod parser;
pub mod router;
pub mod server;

// Re-export commonly used items for convenience
pub use dispatcher::{DispatchError, Dispatcher};
pub use parser::{parse_request, Error as ParserError, HttpRequest, HttpVersion, Method};
pub use router::{Route, RouteTable, RouteType};
pub use server::{Error as ServerError, HttpResponse, HttpServer, ServerConfig, StatusCode};
