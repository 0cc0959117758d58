//! Tests for the HTTP server implementation.

#[cfg(test)]
mod server_tests {
    use std::io::{self, Cursor};
    use std::path::Path;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;

    use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

    use crate::dispatcher::Dispatcher;
    use crate::router::{MethodFilter, RouteType};
    use crate::server::{Error, HttpResponse, HttpServer, ServerConfig, StatusCode};

    // Mock TcpStream for testing
    struct MockTcpStream {
        read_data: Cursor<Vec<u8>>,
        write_data: Vec<u8>,
    }

    impl MockTcpStream {
        fn new(read_data: Vec<u8>) -> Self {
            Self {
                read_data: Cursor::new(read_data),
                write_data: Vec::new(),
            }
        }

        fn written(&self) -> String {
            String::from_utf8_lossy(&self.write_data).into_owned()
        }
    }

    impl AsyncRead for MockTcpStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let this = self.get_mut();
            let n = std::io::Read::read(&mut this.read_data, buf.initialize_unfilled())?;
            buf.advance(n);
            Poll::Ready(Ok(()))
        }
    }

    impl AsyncWrite for MockTcpStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let this = self.get_mut();
            this.write_data.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn config_with_root(root: &Path) -> ServerConfig {
        ServerConfig {
            root: root.to_path_buf(),
            ..ServerConfig::default()
        }
    }

    async fn exchange(dispatcher: &Dispatcher, request: &[u8], read_buffer_size: usize) -> (Result<(), Error>, String) {
        let mut stream = MockTcpStream::new(request.to_vec());
        let result = HttpServer::handle_connection(&mut stream, dispatcher, read_buffer_size, 1024 * 1024).await;
        (result, stream.written())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.max_connections, 1024);
        assert_eq!(config.read_buffer_size, 8192);
        assert_eq!(config.max_request_size, 1024 * 1024);
        assert_eq!(config.root, Path::new("./scripts"));
        assert_eq!(config.index, "app.lua");
        assert_eq!(config.max_forwards, 8);
        assert_eq!(config.script_timeout, Duration::from_secs(5));
        assert_eq!(config.subprocess_timeout, Duration::from_secs(30));
        assert!(config.static_fallback);
        assert!(!config.forward_preserves_request);
        assert!(config.routes.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let text = "\
# sample
host = 0.0.0.0
port = 9000
root = /srv/app
index = main.rhai
max_forwards = 3
script_timeout_ms = 250
subprocess_timeout_ms = 1500
static_fallback = false
forward_preserves_request = true
interpreter.php = php-cgi

route GET /users/:id lua users.lua
route * /old forward /users/:id
";
        let config = ServerConfig::parse(text).unwrap();
        assert_eq!(config.addr.to_string(), "0.0.0.0:9000");
        assert_eq!(config.root, Path::new("/srv/app"));
        assert_eq!(config.index, "main.rhai");
        assert_eq!(config.max_forwards, 3);
        assert_eq!(config.script_timeout, Duration::from_millis(250));
        assert_eq!(config.subprocess_timeout, Duration::from_millis(1500));
        assert!(!config.static_fallback);
        assert!(config.forward_preserves_request);
        assert_eq!(config.interpreters.get("php").map(String::as_str), Some("php-cgi"));

        let routes: Vec<_> = config.routes.iter().collect();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].route_type, RouteType::Lua);
        assert_eq!(routes[0].pattern, "/users/:id");
        assert_eq!(routes[1].method, MethodFilter::Any);
        assert_eq!(routes[1].route_type, RouteType::Forward);
    }

    #[test]
    fn test_parse_config_ignores_unknown_keys() {
        let config = ServerConfig::parse("colour = blue\nport = 8081\n").unwrap();
        assert_eq!(config.addr.port(), 8081);
    }

    #[test]
    fn test_parse_config_reports_line_numbers() {
        match ServerConfig::parse("port = 80\n\nmax_forwards = lots\n") {
            Err(Error::Config { line, message }) => {
                assert_eq!(line, 3);
                assert!(message.contains("max_forwards"));
            }
            other => panic!("expected a config error, got {other:?}"),
        }

        match ServerConfig::parse("# routes\nroute GET /a/*/b lua a.lua\n") {
            Err(Error::Config { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected a config error, got {other:?}"),
        }

        assert!(matches!(
            ServerConfig::parse("just some words\n"),
            Err(Error::Config { line: 1, .. })
        ));
        assert!(matches!(
            ServerConfig::parse("interpreter.cobol = cobc\n"),
            Err(Error::Config { line: 1, .. })
        ));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::load(&dir.path().join("sera.conf")).unwrap();
        assert_eq!(config.max_forwards, 8);
        assert!(config.routes.is_empty());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sera.conf");
        std::fs::write(&path, "max_connections = 7\nroute POST /submit php submit.php\n").unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.max_connections, 7);
        assert_eq!(config.routes.len(), 1);
    }

    #[test]
    fn test_with_route() {
        let config = ServerConfig::default()
            .with_route("route GET /a static a.txt")
            .unwrap();
        assert_eq!(config.routes.len(), 1);

        let err = ServerConfig::default().with_route("route GET /a bogus a.txt").unwrap_err();
        assert!(matches!(err, Error::RouteError(_)));
    }

    #[test]
    fn test_response_bytes() {
        let response = HttpResponse::text(StatusCode::NotFound, "Not Found");
        let text = String::from_utf8(response.to_bytes()).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.contains("Content-Type: text/plain\r\n"));
        assert!(text.contains("Content-Length: 9\r\n"));
        assert!(text.contains("Server: sera\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.ends_with("\r\n\r\nNot Found"));
    }

    #[test]
    fn test_raw_response_is_written_verbatim() {
        let message = b"HTTP/1.1 302 Found\r\nLocation: /next\r\n\r\n".to_vec();
        let response = HttpResponse::raw(message.clone());
        assert_eq!(response.status, StatusCode::Found);
        assert_eq!(response.to_bytes(), message);
        assert_eq!(response.forward_target(), None);
    }

    #[test]
    fn test_forward_target() {
        assert_eq!(HttpResponse::forward("/next").forward_target(), Some("/next"));
        assert_eq!(HttpResponse::text(StatusCode::Ok, "hello").forward_target(), None);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(StatusCode::GatewayTimeout.as_u16(), 504);
        assert_eq!(StatusCode::from_u16(413), Some(StatusCode::PayloadTooLarge));
        assert_eq!(StatusCode::from_u16(299), None);
        assert_eq!(StatusCode::Forbidden.reason_phrase(), "Forbidden");
    }

    #[tokio::test]
    async fn test_handle_connection_serves_static_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "hello there").unwrap();
        let dispatcher = Dispatcher::new(&config_with_root(dir.path()));

        let (result, response) = exchange(&dispatcher, b"GET /hello.txt HTTP/1.1\r\nHost: localhost\r\n\r\n", 1024).await;

        assert!(result.is_ok());
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Type: text/plain\r\n"));
        assert!(response.ends_with("hello there"));
    }

    #[tokio::test]
    async fn test_handle_connection_reads_in_chunks() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("echo.sh"), "cat\n").unwrap();
        let mut config = config_with_root(dir.path())
            .with_route("route POST /echo php echo.sh")
            .unwrap();
        config.interpreters.insert("php".to_string(), "sh".to_string());
        let dispatcher = Dispatcher::new(&config);

        let request = b"POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 11\r\n\r\nhello world";
        let (result, response) = exchange(&dispatcher, request, 8).await;

        assert!(result.is_ok());
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.ends_with("\r\n\r\nhello world"));
    }

    #[tokio::test]
    async fn test_handle_connection_with_invalid_request() {
        let dispatcher = Dispatcher::new(&ServerConfig::default());

        let (result, response) = exchange(&dispatcher, b"BREW /pot HTTP/1.1\r\nHost: localhost\r\n\r\n", 1024).await;

        assert!(matches!(result, Err(Error::ParseError(_))));
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(response.contains("Error parsing request"));
    }

    #[tokio::test]
    async fn test_handle_connection_rejects_large_requests() {
        let dispatcher = Dispatcher::new(&ServerConfig::default());
        let request = b"POST /upload HTTP/1.1\r\nHost: localhost\r\nContent-Length: 4096\r\n\r\n";

        let mut stream = MockTcpStream::new(request.to_vec());
        let result = HttpServer::handle_connection(&mut stream, &dispatcher, 1024, 256).await;

        assert!(matches!(result, Err(Error::RequestTooLarge(256))));
        assert!(stream.written().starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
    }

    #[tokio::test]
    async fn test_handle_connection_rejects_overflowing_content_length() {
        let dispatcher = Dispatcher::new(&ServerConfig::default());
        let request = b"POST / HTTP/1.1\r\nHost: x\r\nContent-Length: 18446744073709551615\r\n\r\n";

        let mut stream = MockTcpStream::new(request.to_vec());
        let result = HttpServer::handle_connection(&mut stream, &dispatcher, 1024, 1024 * 1024).await;

        assert!(matches!(result, Err(Error::RequestTooLarge(_))));
        assert!(stream.written().starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
    }

    #[tokio::test]
    async fn test_handle_connection_without_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            static_fallback: false,
            ..config_with_root(dir.path())
        };
        let dispatcher = Dispatcher::new(&config);

        let (result, response) = exchange(&dispatcher, b"GET /missing HTTP/1.1\r\nHost: localhost\r\n\r\n", 1024).await;

        assert!(result.is_ok());
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(response.ends_with("Not Found"));
    }

    #[tokio::test]
    async fn test_handle_connection_closed_without_data() {
        let dispatcher = Dispatcher::new(&ServerConfig::default());
        let (result, response) = exchange(&dispatcher, b"", 1024).await;
        assert!(result.is_ok());
        assert!(response.is_empty());
    }

    #[tokio::test]
    async fn test_server_creation() {
        let config = ServerConfig {
            max_connections: 42,
            ..ServerConfig::default()
        }
        .with_route("route GET / static index.html")
        .unwrap();

        let server = HttpServer::new(config);
        assert_eq!(server.config.max_connections, 42);
        assert_eq!(server.dispatcher().routes().len(), 1);
    }

    #[tokio::test]
    async fn test_accept_error_backs_off_and_returns() {
        for kind in [io::ErrorKind::BrokenPipe, io::ErrorKind::ConnectionReset, io::ErrorKind::Other] {
            let started = std::time::Instant::now();
            let handled = tokio::time::timeout(
                Duration::from_secs(2),
                HttpServer::handle_accept_error(io::Error::new(kind, "accept failed")),
            )
            .await;
            assert!(handled.is_ok(), "{kind:?}");
            assert!(started.elapsed() >= Duration::from_millis(100), "{kind:?}");
        }
    }
}
