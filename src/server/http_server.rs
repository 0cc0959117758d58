//! HTTP server implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

use crate::dispatcher::Dispatcher;
use crate::parser::{expected_length, parse_request};
use crate::server::config::ServerConfig;
use crate::server::error::Error;
use crate::server::response::{HttpResponse, StatusCode};

/// An HTTP server that hands every request to a [`Dispatcher`].
pub struct HttpServer {
    /// The server configuration.
    pub config: ServerConfig,
    dispatcher: Arc<Dispatcher>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(&config));
        Self { config, dispatcher }
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    /// Log the effective settings and the route table.
    fn display_server_info(&self) {
        self.config.log_summary();

        let routes = self.dispatcher.routes();
        if routes.is_empty() {
            info!("No routes configured, extension and static fallback only");
            return;
        }
        info!("Registered routes:");
        for route in routes.iter() {
            info!("  {route}");
        }
    }

    /// Set up the TCP listener.
    async fn setup_listener(&self) -> Result<TcpListener, Error> {
        let listener = TcpListener::bind(&self.config.addr).await?;
        info!("Server listening on http://{addr}", addr = self.config.addr);
        Ok(listener)
    }

    /// Set up a Ctrl+C handler for graceful shutdown.
    fn setup_ctrl_c_handler(shutdown_tx: mpsc::Sender<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C, initiating graceful shutdown");
                    let _ = shutdown_tx.send(()).await;
                }
                Err(e) => {
                    error!("Error setting up Ctrl+C handler: {e}");
                }
            }
        })
    }

    /// Handle a new connection.
    fn handle_new_connection(
        &self,
        mut socket: TcpStream,
        addr: SocketAddr,
        semaphore: &Arc<Semaphore>,
        tasks: &mut JoinSet<()>,
    ) {
        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("Connection limit reached, rejecting connection from {addr}");
                let response = HttpResponse::text(
                    StatusCode::ServiceUnavailable,
                    "Server is at capacity, please try again later",
                );
                tasks.spawn(async move {
                    let _ = socket.write_all(&response.to_bytes()).await;
                });
                return;
            }
        };

        let dispatcher = self.dispatcher.clone();
        let read_buffer_size = self.config.read_buffer_size;
        let max_request_size = self.config.max_request_size;

        tasks.spawn(async move {
            // Released when the connection task ends
            let _permit = permit;
            debug!("Accepted connection from {addr}");

            if let Err(e) =
                Self::handle_connection(&mut socket, &dispatcher, read_buffer_size, max_request_size).await
            {
                warn!("Error handling connection from {addr}: {e}");
            }
        });
    }

    /// Log a failed accept and back off briefly before the next one.
    pub(crate) async fn handle_accept_error(e: std::io::Error) {
        error!("Error accepting connection: {e}");
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }

    /// Perform graceful shutdown.
    async fn perform_shutdown(tasks: &mut JoinSet<()>) {
        info!("Waiting for {len} active connections to complete...", len = tasks.len());
        let shutdown_timeout = tokio::time::Duration::from_secs(30);
        let _ = tokio::time::timeout(shutdown_timeout, async {
            while let Some(res) = tasks.join_next().await {
                if let Err(e) = res {
                    error!("Task failed during shutdown: {e}");
                }
            }
        })
        .await;

        info!("Server shutdown complete");
    }

    /// Bind the configured address and serve until Ctrl+C.
    pub async fn start(&self) -> Result<(), Error> {
        self.display_server_info();
        let listener = self.setup_listener().await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener until Ctrl+C.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), Error> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_connections));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let ctrl_c = Self::setup_ctrl_c_handler(shutdown_tx);
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutting down server...");
                    break;
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((socket, addr)) => {
                            self.handle_new_connection(socket, addr, &semaphore, &mut tasks);
                        }
                        Err(e) => Self::handle_accept_error(e).await,
                    }
                }

                // Reap finished connection tasks as we go
                Some(res) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = res {
                        error!("Connection task failed: {e}");
                    }
                }
            }
        }

        ctrl_c.abort();
        Self::perform_shutdown(&mut tasks).await;

        Ok(())
    }

    /// Handle a single connection: read one request, dispatch it, write the
    /// response.
    pub async fn handle_connection(
        socket: &mut (impl AsyncRead + AsyncWrite + Unpin),
        dispatcher: &Dispatcher,
        read_buffer_size: usize,
        max_request_size: usize,
    ) -> Result<(), Error> {
        let mut chunk = vec![0; read_buffer_size.max(1)];
        let mut buf = Vec::new();

        loop {
            let n = socket.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let expected = expected_length(&buf);
            if buf.len() > max_request_size || expected.is_some_and(|len| len > max_request_size) {
                let response = HttpResponse::text(StatusCode::PayloadTooLarge, "Request too large");
                socket.write_all(&response.to_bytes()).await?;
                return Err(Error::RequestTooLarge(max_request_size));
            }
            if expected.is_some_and(|len| buf.len() >= len) {
                break;
            }
        }

        if buf.is_empty() {
            return Ok(()); // Connection closed
        }

        let request = match parse_request(&buf) {
            Ok(req) => req,
            Err(e) => {
                let response = HttpResponse::text(StatusCode::BadRequest, format!("Error parsing request: {e}"));
                socket.write_all(&response.to_bytes()).await?;
                return Err(Error::ParseError(e));
            }
        };

        let response = dispatcher.dispatch(request).await;
        socket.write_all(&response.to_bytes()).await?;
        socket.flush().await?;

        Ok(())
    }
}
