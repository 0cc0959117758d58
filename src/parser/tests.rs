//! Tests for the HTTP parser.

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use crate::parser::{HttpRequest, Method, HttpVersion, Error, expected_length, parse_request};

    fn headers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_parse_simple_get_request() {
        let request = b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let result = parse_request(request).unwrap();
        assert_eq!(result.method, Method::GET);
        assert_eq!(result.path, "/index.html");
        assert_eq!(result.query, "");
        assert_eq!(result.version, HttpVersion::Http11);
        assert_eq!(result.get_header("Host").unwrap(), "example.com");
        assert!(result.body.is_empty());
        assert!(result.params.is_empty());
    }

    #[test]
    fn test_case_insensitive_headers() {
        let request = b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let result = parse_request(request).unwrap();
        assert!(result.has_header("host"));
        assert!(result.has_header("HOST"));
        assert!(!result.has_header("X-Test"));
    }

    #[test]
    fn test_missing_host_header() {
        let request = b"GET /index.html HTTP/1.1\r\n\r\n";
        let result = parse_request(request);
        assert!(matches!(result, Err(Error::MissingHeader(ref h)) if h == "Host"));
    }

    #[test]
    fn test_http10_without_host() {
        let request = b"GET /index.html HTTP/1.0\r\n\r\n";
        let result = parse_request(request).unwrap();
        assert_eq!(result.version, HttpVersion::Http10);
        assert!(result.headers.is_empty());
    }

    #[test]
    fn test_invalid_method() {
        let request = b"BREW /pot HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let result = parse_request(request);
        assert!(matches!(result, Err(Error::InvalidMethod(ref m)) if m == "BREW"));
    }

    #[test]
    fn test_invalid_http_version() {
        let request = b"GET /index.html HTTP/2\r\nHost: example.com\r\n\r\n";
        let result = parse_request(request);
        assert!(matches!(result, Err(Error::InvalidVersion(ref v)) if v == "HTTP/2"));
    }

    #[test]
    fn test_relative_target_rejected() {
        let request = b"GET index.html HTTP/1.1\r\nHost: example.com\r\n\r\n";
        assert!(matches!(parse_request(request), Err(Error::InvalidPath)));
    }

    #[test]
    fn test_invalid_header_format() {
        let request = b"GET /index.html HTTP/1.1\r\nInvalidHeader\r\n\r\n";
        let result = parse_request(request);
        assert!(matches!(result, Err(Error::InvalidHeaderFormat)));
    }

    #[test]
    fn test_empty_request() {
        assert!(matches!(parse_request(b""), Err(Error::EmptyRequest)));
        assert!(matches!(parse_request(b"\r\n\r\n"), Err(Error::EmptyRequest)));
    }

    #[test]
    fn test_incomplete_request_line() {
        let result = parse_request(b"GET\r\n");
        assert!(matches!(result, Err(Error::MalformedRequestLine(_))));
    }

    #[test]
    fn test_all_methods() {
        for method in ["GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH"] {
            let request = format!("{method} /x HTTP/1.1\r\nHost: a\r\n\r\n");
            let result = parse_request(request.as_bytes()).unwrap();
            assert_eq!(result.method.as_str(), method);
            assert_eq!(result.method.to_string(), method);
        }
    }

    #[test]
    fn test_headers_with_multiple_colons() {
        let request = b"GET / HTTP/1.1\r\nHost: example.com\r\nX-Test: value:with:colons\r\n\r\n";
        let result = parse_request(request).unwrap();
        assert_eq!(result.get_header("X-Test").unwrap(), "value:with:colons");
    }

    #[test]
    fn test_mixed_line_endings() {
        let request = b"GET /index.html HTTP/1.1\r\nHost: example.com\nUser-Agent: test\r\n\r\n";
        let result = parse_request(request).unwrap();
        assert_eq!(result.get_header("Host").unwrap(), "example.com");
        assert_eq!(result.get_header("User-Agent").unwrap(), "test");
    }

    #[test]
    fn test_duplicate_headers_are_kept_in_order() {
        let request = b"GET / HTTP/1.1\r\nHost: example.com\r\nX-Test: value1\r\nX-Test: value2\r\n\r\n";
        let result = parse_request(request).unwrap();
        assert_eq!(result.get_header("X-Test").unwrap(), "value1");
        let all: Vec<&str> = result.get_headers("x-test").collect();
        assert_eq!(all, vec!["value1", "value2"]);
    }

    #[test]
    fn test_query_is_split_from_path() {
        let request = b"GET /search?q=test%20query&flag&empty= HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let result = parse_request(request).unwrap();
        assert_eq!(result.path, "/search");
        assert_eq!(result.query, "q=test%20query&flag&empty=");
        assert_eq!(result.get_query_param("q").unwrap(), "test%20query");
        assert_eq!(result.get_query_param("flag").unwrap(), "");
        assert_eq!(result.get_query_param("empty").unwrap(), "");
        assert!(result.get_query_param("missing").is_none());
    }

    #[test]
    fn test_malformed_utf8_in_request() {
        let request = b"GET /index.html HTTP/1.1\r\nHost: example.com\r\nX-Test: \xFF\xFF\xFF\r\n\r\n";
        let result = parse_request(request);
        assert!(matches!(result, Err(Error::MalformedRequestLine(ref s)) if s == "Invalid UTF-8"));
    }

    #[test]
    fn test_body_follows_content_length() {
        let request = b"POST /api/users?role=admin HTTP/1.1\r\n\
            Host: example.com\r\n\
            Content-Type: application/json\r\n\
            Content-Length: 4\r\n\
            \r\n\
            abcdEXTRA";

        let result = parse_request(request).unwrap();
        assert_eq!(result.method, Method::POST);
        assert_eq!(result.path, "/api/users");
        assert_eq!(result.query, "role=admin");
        assert_eq!(result.body, b"abcd");
    }

    #[test]
    fn test_body_without_content_length() {
        let request = b"POST /echo HTTP/1.0\r\n\r\nhello";
        let result = parse_request(request).unwrap();
        assert_eq!(result.body, b"hello");
    }

    #[test]
    fn test_invalid_content_length() {
        let request = b"POST / HTTP/1.1\r\nHost: a\r\nContent-Length: lots\r\n\r\n";
        let result = parse_request(request);
        assert!(matches!(result, Err(Error::InvalidContentLength(ref v)) if v == "lots"));
    }

    #[test]
    fn test_expected_length() {
        assert_eq!(expected_length(b"GET / HTTP/1.1\r\nHost: a"), None);

        let head = b"GET / HTTP/1.1\r\nHost: a\r\n\r\n";
        assert_eq!(expected_length(head), Some(head.len()));

        let post = b"POST / HTTP/1.1\r\nHost: a\r\nContent-Length: 10\r\n\r\n";
        assert_eq!(expected_length(post), Some(post.len() + 10));
    }

    #[test]
    fn test_expected_length_saturates_on_huge_content_length() {
        let request = b"GET / HTTP/1.1\r\nHost: x\r\nContent-Length: 18446744073709551615\r\n\r\n";
        assert_eq!(expected_length(request), Some(usize::MAX));
    }

    #[test]
    fn test_forwarded_minimal() {
        let mut original = HttpRequest::with_body(
            Method::POST,
            "/old?x=1",
            HttpVersion::Http11,
            headers(&[("Host", "example.com")]),
            b"payload".to_vec(),
        );
        original.params.insert("id", "7");

        let forwarded = original.forwarded("/new?y=2", false);
        assert_eq!(forwarded.method, Method::GET);
        assert_eq!(forwarded.path, "/new");
        assert_eq!(forwarded.query, "y=2");
        assert!(forwarded.headers.is_empty());
        assert!(forwarded.body.is_empty());
        assert!(forwarded.params.is_empty());

        let bare = original.forwarded("/new", false);
        assert_eq!(bare.query, "");
    }

    #[test]
    fn test_forwarded_preserving() {
        let original = HttpRequest::with_body(
            Method::PUT,
            "/old?x=1",
            HttpVersion::Http11,
            headers(&[("Host", "example.com")]),
            b"payload".to_vec(),
        );

        let forwarded = original.forwarded("/new", true);
        assert_eq!(forwarded.method, Method::PUT);
        assert_eq!(forwarded.path, "/new");
        assert_eq!(forwarded.query, "x=1");
        assert_eq!(forwarded.get_header("host").unwrap(), "example.com");
        assert_eq!(forwarded.body, b"payload");

        let overridden = original.forwarded("/new?z=3", true);
        assert_eq!(overridden.query, "z=3");
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestUser {
        name: String,
        email: String,
    }

    #[test]
    fn test_json_parsing() {
        let json_headers = headers(&[("Host", "example.com"), ("Content-Type", "application/json")]);
        let body = r#"{"name":"John Doe","email":"john@example.com"}"#.as_bytes().to_vec();
        let request = HttpRequest::with_body(Method::POST, "/api/users", HttpVersion::Http11, json_headers.clone(), body.clone());

        assert!(request.is_json());
        let user: TestUser = request.json().unwrap();
        assert_eq!(user.name, "John Doe");
        assert_eq!(user.email, "john@example.com");

        let text_headers = headers(&[("Host", "example.com"), ("Content-Type", "text/plain")]);
        let request_no_json = HttpRequest::with_body(Method::POST, "/api/users", HttpVersion::Http11, text_headers, body);
        let result: Result<TestUser, _> = request_no_json.json();
        assert!(matches!(result, Err(Error::MissingHeader(_))));

        let invalid_body = r#"{"name":"John Doe","email":}"#.as_bytes().to_vec();
        let request_invalid_json = HttpRequest::with_body(Method::POST, "/api/users", HttpVersion::Http11, json_headers, invalid_body);
        let result: Result<TestUser, _> = request_invalid_json.json();
        assert!(matches!(result, Err(Error::JsonError(_))));
    }

    #[test]
    fn test_http_version_display() {
        assert_eq!(HttpVersion::Http10.to_string(), "HTTP/1.0");
        assert_eq!(HttpVersion::Http11.to_string(), "HTTP/1.1");
        assert_eq!(HttpVersion::default(), HttpVersion::Http11);
    }
}
