//! CGI-style subprocess backend.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use log::{debug, error, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::time::Instant;

use crate::backend::{resolve_target, AdapterError};
use crate::parser::HttpRequest;
use crate::router::RouteType;
use crate::server::{HttpResponse, StatusCode};

/// Runs a script under an external interpreter, one child process per request.
///
/// The request reaches the child through CGI environment variables and its
/// standard input; standard output becomes the response.
pub struct Subprocess {
    root: PathBuf,
    interpreters: HashMap<String, String>,
    timeout: Duration,
    max_output: usize,
}

impl Subprocess {
    pub fn new(root: &Path, interpreters: HashMap<String, String>, timeout: Duration, max_output: usize) -> Self {
        Self {
            root: root.to_path_buf(),
            interpreters,
            timeout,
            max_output,
        }
    }

    /// The interpreter binary for a route type, defaulting to the type name.
    pub fn interpreter(&self, route_type: RouteType) -> &str {
        self.interpreters
            .get(route_type.as_str())
            .map(String::as_str)
            .unwrap_or(route_type.as_str())
    }

    pub async fn execute(
        &self,
        request: &HttpRequest,
        target: &str,
        route_type: RouteType,
    ) -> Result<HttpResponse, AdapterError> {
        let script = resolve_target(&self.root, target)?;
        if !tokio::fs::metadata(&script).await.is_ok_and(|meta| meta.is_file()) {
            return Err(AdapterError::NotFound(target.to_string()));
        }

        let interpreter = self.interpreter(route_type);
        let mut command = Command::new(interpreter);
        command
            .arg(&script)
            .env("REQUEST_METHOD", request.method.as_str())
            .env("PATH_INFO", &request.path)
            .env("QUERY_STRING", &request.query)
            .env("CONTENT_LENGTH", request.body.len().to_string())
            .env("SCRIPT_FILENAME", &script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (name, value) in request.params.iter() {
            command.env(format!("ROUTE_PARAM_{}", name.to_ascii_uppercase()), value);
        }

        let mut child = command.spawn().map_err(|e| {
            error!("Failed to spawn {interpreter} {}: {e}", script.display());
            AdapterError::Execution("Failed to execute script".to_string())
        })?;

        let (Some(mut stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            reap(&mut child).await;
            return Err(AdapterError::Execution("Failed to execute script".to_string()));
        };

        let body = request.body.clone();
        let feed = async move {
            // A child that never reads its input is not an error
            if let Err(e) = stdin.write_all(&body).await {
                debug!("Child closed stdin early: {e}");
            }
        };

        // One byte past the limit is enough to tell that the limit was hit
        let limit = self.max_output as u64;
        let capture = async move {
            let mut output = Vec::new();
            stdout.take(limit + 1).read_to_end(&mut output).await.map(|_| output)
        };
        let diagnostics = tokio::spawn(async move {
            let mut output = Vec::new();
            let _ = stderr.take(limit).read_to_end(&mut output).await;
            output
        });

        let exchange = async {
            let ((), output) = tokio::join!(feed, capture);
            output
        };

        // One deadline covers the exchange and the exit
        let deadline = Instant::now() + self.timeout;

        let output = match tokio::time::timeout_at(deadline, exchange).await {
            Ok(result) => result,
            Err(_) => return Err(self.time_out(&script, &mut child).await),
        };

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                reap(&mut child).await;
                return Err(AdapterError::Execution(format!("Failed to read script output: {e}")));
            }
        };

        if output.len() as u64 > limit {
            reap(&mut child).await;
            return Err(AdapterError::Execution(format!(
                "Script output exceeded {} bytes",
                self.max_output
            )));
        }

        let exit = tokio::time::timeout_at(deadline, child.wait()).await;
        match exit {
            Ok(Ok(status)) if !status.success() => {
                warn!("{} exited with {status}", script.display());
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Failed to wait for {}: {e}", script.display()),
            Err(_) => return Err(self.time_out(&script, &mut child).await),
        }

        // A grandchild may still hold stderr open
        let diagnostics = match tokio::time::timeout(Duration::from_millis(100), diagnostics).await {
            Ok(Ok(diagnostics)) => diagnostics,
            _ => Vec::new(),
        };
        if !diagnostics.is_empty() {
            warn!(
                "{} stderr: {}",
                script.display(),
                String::from_utf8_lossy(&diagnostics).trim_end()
            );
        }

        if output.starts_with(b"HTTP/") {
            return Ok(HttpResponse::raw(output));
        }

        Ok(HttpResponse::new(StatusCode::Ok)
            .with_content_type("text/html")
            .with_body_bytes(output))
    }

    async fn time_out(&self, script: &Path, child: &mut Child) -> AdapterError {
        warn!("{} timed out after {:?}, killing it", script.display(), self.timeout);
        reap(child).await;
        AdapterError::Timeout(self.timeout)
    }
}

/// Kill the child if it is still running and collect its exit status.
async fn reap(child: &mut Child) {
    if let Err(e) = child.kill().await {
        debug!("Kill failed, waiting instead: {e}");
        let _ = child.wait().await;
    }
}
