//! HTTP request parsing and representation.

use std::str::FromStr;
use serde::de::DeserializeOwned;

use crate::parser::error::Error;
use crate::parser::method::Method;
use crate::parser::version::HttpVersion;
use crate::router::Params;

/// Represents an HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request path, without the query string
    pub path: String,
    /// The raw query string (everything after `?`), empty if absent
    pub query: String,
    /// The HTTP version
    pub version: HttpVersion,
    /// The HTTP headers in arrival order; duplicates are kept
    pub headers: Vec<(String, String)>,
    /// The request body
    pub body: Vec<u8>,
    /// Route parameters extracted by the path matcher
    pub params: Params,
}

impl HttpRequest {
    /// Create a new HTTP request.
    ///
    /// `target` is the request target as it appears on the request line; the
    /// query string, if any, is split off into [`HttpRequest::query`].
    pub fn new(method: Method, target: &str, version: HttpVersion, headers: Vec<(String, String)>) -> Self {
        let (path, query) = split_target(target);

        Self {
            method,
            path,
            query,
            version,
            headers,
            body: Vec::new(),
            params: Params::new(),
        }
    }

    /// Create a new HTTP request with a body.
    pub fn with_body(method: Method, target: &str, version: HttpVersion, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        let mut request = Self::new(method, target, version, headers);
        request.body = body;
        request
    }

    /// Shorthand for a bodiless HTTP/1.1 request with no headers.
    pub fn get(target: &str) -> Self {
        Self::new(Method::GET, target, HttpVersion::Http11, Vec::new())
    }

    /// Build the request that an internal forward to `target` dispatches.
    ///
    /// A minimal forward carries only the new path and whatever query the
    /// forward target itself supplies. With `preserve` set, the method,
    /// headers and body of the current request carry over, and so does its
    /// query unless the target brings its own.
    pub fn forwarded(&self, target: &str, preserve: bool) -> Self {
        let (path, query) = split_target(target);

        if !preserve {
            return Self {
                method: Method::GET,
                path,
                query,
                version: self.version,
                headers: Vec::new(),
                body: Vec::new(),
                params: Params::new(),
            };
        }

        Self {
            method: self.method,
            path,
            query: if query.is_empty() { self.query.clone() } else { query },
            version: self.version,
            headers: self.headers.clone(),
            body: self.body.clone(),
            params: Params::new(),
        }
    }

    /// Get a header value.
    ///
    /// Headers are case-insensitive; the first occurrence wins.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values of a repeated header, in arrival order.
    pub fn get_headers<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Check if a header exists.
    pub fn has_header(&self, name: &str) -> bool {
        self.get_header(name).is_some()
    }

    /// Parse the request body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        if !self.is_json() {
            return Err(Error::MissingHeader("Content-Type: application/json".to_string()));
        }

        let json = serde_json::from_slice(&self.body)?;
        Ok(json)
    }

    /// Check if the request has a JSON body.
    pub fn is_json(&self) -> bool {
        self.get_header("Content-Type")
            .is_some_and(|content_type| content_type.starts_with("application/json"))
    }

    /// The query string split into `key=value` pairs.
    ///
    /// Keys without a value map to an empty string. No percent-decoding is
    /// applied.
    pub fn query_params(&self) -> Vec<(&str, &str)> {
        self.query
            .split('&')
            .filter(|s| !s.is_empty())
            .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
            .collect()
    }

    /// Get a query parameter value.
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params()
            .into_iter()
            .find_map(|(k, v)| (k == name).then_some(v))
    }
}

fn split_target(target: &str) -> (String, String) {
    match target.split_once('?') {
        Some((path, query)) => (path.to_string(), query.to_string()),
        None => (target.to_string(), String::new()),
    }
}

/// Locate the end of the header block.
///
/// Returns the offset of the first body byte.
fn header_end(input: &[u8]) -> Option<usize> {
    if let Some(pos) = input.windows(4).position(|w| w == b"\r\n\r\n") {
        return Some(pos + 4);
    }
    input.windows(2).position(|w| w == b"\n\n").map(|pos| pos + 2)
}

fn content_length(headers: &[(String, String)]) -> Result<Option<usize>, Error> {
    match headers.iter().find(|(k, _)| k.eq_ignore_ascii_case("Content-Length")) {
        Some((_, value)) => value
            .parse::<usize>()
            .map(Some)
            .map_err(|_| Error::InvalidContentLength(value.clone())),
        None => Ok(None),
    }
}

/// Total number of bytes the request in `input` occupies, once known.
///
/// Returns `None` while the header block is still incomplete. The connection
/// handler keeps reading until the buffer holds at least this many bytes.
pub fn expected_length(input: &[u8]) -> Option<usize> {
    let end = header_end(input)?;
    let head = std::str::from_utf8(&input[..end]).ok()?;
    let length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("Content-Length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    // A length that overflows can never fit under any size limit
    Some(end.checked_add(length).unwrap_or(usize::MAX))
}

/// Parse an HTTP request from a byte slice.
///
/// The body is taken from the bytes after the header block, truncated to
/// `Content-Length` when that header is present.
pub fn parse_request(input: &[u8]) -> Result<HttpRequest, Error> {
    if input.is_empty() {
        return Err(Error::EmptyRequest);
    }

    let (head, rest) = match header_end(input) {
        Some(end) => (&input[..end], &input[end..]),
        None => (input, &input[input.len()..]),
    };

    let head = std::str::from_utf8(head)
        .map_err(|_| Error::MalformedRequestLine("Invalid UTF-8".to_string()))?;

    let mut lines = head.lines();

    let request_line = match lines.next() {
        Some(line) if !line.trim().is_empty() => line,
        _ => return Err(Error::EmptyRequest),
    };

    // Split the request line into method, target, and version
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(Error::MalformedRequestLine(request_line.to_string()));
    }

    let method = Method::from_str(parts[0])?;

    let target = parts[1];
    if !target.starts_with('/') {
        return Err(Error::InvalidPath);
    }

    let version = HttpVersion::from_str(parts[2])?;

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            break;
        }

        let (name, value) = line.split_once(':').ok_or(Error::InvalidHeaderFormat)?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    if version == HttpVersion::Http11 && !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("Host")) {
        return Err(Error::MissingHeader("Host".to_string()));
    }

    let body = match content_length(&headers)? {
        Some(length) => rest[..length.min(rest.len())].to_vec(),
        None => rest.to_vec(),
    };

    Ok(HttpRequest::with_body(method, target, version, headers, body))
}
