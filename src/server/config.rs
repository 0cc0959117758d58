//! Server configuration.
//!
//! A configuration file holds `key = value` settings and `route` lines:
//!
//! ```text
//! # sera.conf
//! host = 0.0.0.0
//! port = 8080
//! root = ./scripts
//! interpreter.php = php-cgi
//!
//! route GET /users/:id lua users.lua
//! route * /old forward /users/:id
//! ```

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::{info, warn};

use crate::router::{Route, RouteTable, RouteType};
use crate::server::error::Error;

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The address to bind to.
    pub addr: SocketAddr,
    /// The maximum number of concurrent connections.
    pub max_connections: usize,
    /// The read buffer size.
    pub read_buffer_size: usize,
    /// Requests larger than this are answered with 413.
    pub max_request_size: usize,
    /// Directory that route targets and static paths resolve against.
    pub root: PathBuf,
    /// File served for directory requests.
    pub index: String,
    /// How many forwards one request may follow.
    pub max_forwards: usize,
    pub script_timeout: Duration,
    pub subprocess_timeout: Duration,
    /// Cap on captured subprocess output.
    pub max_output_bytes: usize,
    /// Serve unmatched paths from `root`. When off they get 404.
    pub static_fallback: bool,
    /// Carry method, headers and body across forwards.
    pub forward_preserves_request: bool,
    /// Interpreter binary per route type name, e.g. `php` -> `php-cgi`.
    pub interpreters: HashMap<String, String>,
    pub routes: RouteTable,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_connections: 1024,
            read_buffer_size: 8192,
            max_request_size: 1024 * 1024,
            root: PathBuf::from("./scripts"),
            index: "app.lua".to_string(),
            max_forwards: 8,
            script_timeout: Duration::from_secs(5),
            subprocess_timeout: Duration::from_secs(30),
            max_output_bytes: 8 * 1024 * 1024,
            static_fallback: true,
            forward_preserves_request: false,
            interpreters: HashMap::new(),
            routes: RouteTable::default(),
        }
    }
}

impl ServerConfig {
    /// Load the configuration file at `path`, or the defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self, Error> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                info!("Loading configuration from {}", path.display());
                Self::parse(&text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No configuration at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Parse configuration text on top of the defaults.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let mut config = Self::default();
        let mut host = config.addr.ip();
        let mut port = config.addr.port();

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let content = raw.trim();
            if content.is_empty() || content.starts_with('#') {
                continue;
            }

            if content.split_whitespace().next() == Some("route") {
                let route = Route::parse_line(content).map_err(|e| Error::Config {
                    line,
                    message: e.to_string(),
                })?;
                config.routes.push(route);
                continue;
            }

            let Some((key, value)) = content.split_once('=') else {
                return Err(Error::Config {
                    line,
                    message: format!("expected `key = value`, found `{content}`"),
                });
            };
            let (key, value) = (key.trim(), value.trim());
            let invalid = |e: String| Error::Config {
                line,
                message: format!("invalid value for `{key}`: {e}"),
            };

            match key {
                "host" => host = parse_value::<IpAddr>(value).map_err(invalid)?,
                "port" => port = parse_value(value).map_err(invalid)?,
                "root" => config.root = PathBuf::from(value),
                "index" => config.index = value.to_string(),
                "max_connections" => config.max_connections = parse_value(value).map_err(invalid)?,
                "read_buffer_size" => config.read_buffer_size = parse_value(value).map_err(invalid)?,
                "max_request_size" => config.max_request_size = parse_value(value).map_err(invalid)?,
                "max_forwards" => config.max_forwards = parse_value(value).map_err(invalid)?,
                "script_timeout_ms" => {
                    config.script_timeout = Duration::from_millis(parse_value(value).map_err(invalid)?)
                }
                "subprocess_timeout_ms" => {
                    config.subprocess_timeout = Duration::from_millis(parse_value(value).map_err(invalid)?)
                }
                "max_output_bytes" => config.max_output_bytes = parse_value(value).map_err(invalid)?,
                "static_fallback" => config.static_fallback = parse_value(value).map_err(invalid)?,
                "forward_preserves_request" => {
                    config.forward_preserves_request = parse_value(value).map_err(invalid)?
                }
                _ => match key.strip_prefix("interpreter.") {
                    Some(route_type) => {
                        RouteType::from_str(route_type).map_err(|e| invalid(e.to_string()))?;
                        config.interpreters.insert(route_type.to_string(), value.to_string());
                    }
                    None => warn!("Ignoring unknown configuration key `{key}` on line {line}"),
                },
            }
        }

        config.addr = SocketAddr::new(host, port);
        Ok(config)
    }

    /// Append a route given in route-line syntax.
    pub fn with_route(mut self, line: &str) -> Result<Self, Error> {
        self.routes.push(Route::parse_line(line)?);
        Ok(self)
    }

    /// Log the effective settings.
    pub fn log_summary(&self) {
        info!("Document root: {}", self.root.display());
        info!(
            "Limits: {} connections, {} byte requests, {} forwards",
            self.max_connections, self.max_request_size, self.max_forwards
        );
        info!(
            "Timeouts: scripts {:?}, subprocesses {:?}",
            self.script_timeout, self.subprocess_timeout
        );
        for (route_type, binary) in &self.interpreters {
            info!("Interpreter for {route_type}: {binary}");
        }
    }
}

fn parse_value<T>(value: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| e.to_string())
}
