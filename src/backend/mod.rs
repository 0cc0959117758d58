//! Backend adapters.
//!
//! Every adapter answers the same question: given a request and a route
//! target, produce a response or an [`AdapterError`]. Adapters own whatever
//! long-lived state they need and enforce their own concurrency policy, so the
//! dispatcher can call them from any number of connection tasks.

mod database;
mod error;
mod forward;
mod native;
mod script;
mod static_files;
mod subprocess;

use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub use database::Database;
pub use error::{AdapterError, ModuleError};
pub use forward::{substitute_params, FORWARD_SENTINEL};
pub use native::{NativeModule, NativeModules, ENTRY_SYMBOL};
pub use script::ScriptEngine;
pub use static_files::{mime_type, StaticFiles};
pub use subprocess::Subprocess;

use crate::parser::HttpRequest;
use crate::router::RouteType;
use crate::server::{HttpResponse, ServerConfig};

/// The closed set of execution mechanisms a route can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Static,
    ScriptingEngine,
    Subprocess,
    NativeModule,
    Database,
    /// Not an execution mechanism: answers with a forward sentinel that the
    /// dispatcher resolves internally.
    Forward,
}

/// One instance of each adapter, built from the server configuration.
pub struct Backends {
    static_files: StaticFiles,
    scripts: ScriptEngine,
    cgi: Subprocess,
    modules: NativeModules,
    database: Database,
}

impl Backends {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            static_files: StaticFiles::new(&config.root, &config.index),
            scripts: ScriptEngine::new(&config.root, config.script_timeout),
            cgi: Subprocess::new(
                &config.root,
                config.interpreters.clone(),
                config.subprocess_timeout,
                config.max_output_bytes,
            ),
            modules: NativeModules::new(&config.root),
            database: Database::new(&config.root),
        }
    }

    /// Run `target` on the backend that `route_type` selects.
    pub async fn execute(
        &self,
        route_type: RouteType,
        request: &HttpRequest,
        target: &str,
    ) -> Result<HttpResponse, AdapterError> {
        match route_type.backend() {
            BackendKind::Static => self.static_files.execute(request, target).await,
            BackendKind::ScriptingEngine => self.scripts.execute(request, target).await,
            BackendKind::Subprocess => self.cgi.execute(request, target, route_type).await,
            BackendKind::NativeModule => self.modules.execute(request, target).await,
            BackendKind::Database => self.database.execute(request, target).await,
            BackendKind::Forward => Ok(forward::execute(request, target)),
        }
    }
}

/// Resolve a route target below `root`.
///
/// Leading slashes are ignored, so `/app.lua` and `app.lua` name the same
/// file. Any `..` component is refused.
pub fn resolve_target(root: &Path, target: &str) -> Result<PathBuf, AdapterError> {
    let mut relative = PathBuf::new();
    for component in Path::new(target.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::ParentDir => return Err(AdapterError::Forbidden(target.to_string())),
            _ => {}
        }
    }
    Ok(root.join(relative))
}

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
