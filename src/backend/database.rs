//! SQLite backend.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};

use crate::backend::{resolve_target, AdapterError};
use crate::parser::HttpRequest;
use crate::server::{HttpResponse, StatusCode};

/// The probe every database route answers with.
pub const PROBE_QUERY: &str = "SELECT 'SQLite connected successfully'";

/// Opens the database file named by the route, runs [`PROBE_QUERY`], and
/// closes it again. No connection outlives a request.
pub struct Database {
    root: PathBuf,
}

impl Database {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub async fn execute(&self, _request: &HttpRequest, target: &str) -> Result<HttpResponse, AdapterError> {
        let path = resolve_target(&self.root, target)?;
        tokio::task::spawn_blocking(move || probe(&path)).await?
    }
}

fn probe(path: &Path) -> Result<HttpResponse, AdapterError> {
    // Never create a database file as a side effect of a request
    let connection = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_WRITE)
        .map_err(|e| AdapterError::Execution(format!("Cannot open {}: {e}", path.display())))?;

    let text: String = connection
        .query_row(PROBE_QUERY, [], |row| row.get(0))
        .map_err(|e| AdapterError::Execution(format!("Query failed: {e}")))?;

    connection
        .close()
        .map_err(|(_, e)| AdapterError::Execution(format!("Cannot close {}: {e}", path.display())))?;

    Ok(HttpResponse::text(StatusCode::Ok, text))
}
