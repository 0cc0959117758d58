//! Static file responder.

use std::path::{Path, PathBuf};
use log::debug;

use crate::backend::{resolve_target, AdapterError};
use crate::parser::{HttpRequest, Method};
use crate::server::{HttpResponse, StatusCode};

/// Serves files below a document root.
pub struct StaticFiles {
    root: PathBuf,
    index: String,
}

impl StaticFiles {
    pub fn new(root: &Path, index: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            index: index.to_string(),
        }
    }

    /// Serve `target`, or the index file when it names a directory.
    pub async fn execute(&self, request: &HttpRequest, target: &str) -> Result<HttpResponse, AdapterError> {
        let mut path = resolve_target(&self.root, target)?;

        if tokio::fs::metadata(&path).await.is_ok_and(|meta| meta.is_dir()) {
            path.push(&self.index);
        }

        let content = tokio::fs::read(&path).await.map_err(|e| {
            debug!("Cannot read {}: {e}", path.display());
            AdapterError::NotFound(target.to_string())
        })?;

        let response = HttpResponse::new(StatusCode::Ok).with_content_type(mime_type(&path));

        // HEAD gets the length of the body it would have received
        if request.method == Method::HEAD {
            let length = content.len().to_string();
            return Ok(response
                .with_body_bytes(Vec::new())
                .with_header("Content-Length", length));
        }

        Ok(response.with_body_bytes(content))
    }
}

/// Content type for a file, by extension. Unknown extensions are plain text.
pub fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        // Reached through static routes; the extension table sends .js to scripts
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("txt") => "text/plain",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("pdf") => "application/pdf",
        Some("wasm") => "application/wasm",
        _ => "text/plain",
    }
}
