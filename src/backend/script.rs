//! Embedded scripting engine.
//!
//! One Rhai engine lives for the whole process. Each request recompiles and
//! runs its target script against that engine, then calls whichever callback
//! the script registered for the request path:
//!
//! ```rhai
//! if !("hits" in state) { state.hits = 0; }
//! state.hits += 1;
//!
//! route("/hello", |req| `Hello ${req.params.name}`);
//! route("/old", |req| forward("/hello"));
//! ```
//!
//! Scripts see `request` (method, path, query, body, params), the persistent
//! `state` map, and the host functions `route(path, callback)` and
//! `forward(path)`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::debug;
use rhai::{Dynamic, Engine, EvalAltResult, FnPtr, ImmutableString, Map, Scope};

use crate::backend::{lock, resolve_target, AdapterError, FORWARD_SENTINEL};
use crate::parser::HttpRequest;
use crate::server::{HttpResponse, StatusCode};

/// How many engine operations pass between two watchdog clock reads.
const WATCHDOG_INTERVAL: u64 = 1024;

type ScriptRoutes = Arc<Mutex<HashMap<String, FnPtr>>>;

/// The scripting-engine adapter.
///
/// Cloning is cheap; clones share the same interpreter context.
#[derive(Clone)]
pub struct ScriptEngine {
    root: PathBuf,
    timeout: Duration,
    context: Arc<Mutex<ScriptContext>>,
}

struct ScriptContext {
    engine: Engine,
    scope: Scope<'static>,
    routes: ScriptRoutes,
    deadline: Arc<Mutex<Option<Instant>>>,
}

impl ScriptEngine {
    pub fn new(root: &Path, timeout: Duration) -> Self {
        Self {
            root: root.to_path_buf(),
            timeout,
            context: Arc::new(Mutex::new(ScriptContext::new())),
        }
    }

    /// Run the script named by `target` for `request`.
    ///
    /// Invocations never overlap: the whole compile, run and callback sequence
    /// holds the context lock, on the blocking thread pool.
    pub async fn execute(&self, request: &HttpRequest, target: &str) -> Result<HttpResponse, AdapterError> {
        let script = resolve_target(&self.root, target)?;
        if !tokio::fs::metadata(&script).await.is_ok_and(|meta| meta.is_file()) {
            return Err(AdapterError::NotFound(target.to_string()));
        }

        let context = self.context.clone();
        let request = request.clone();
        let timeout = self.timeout;

        tokio::task::spawn_blocking(move || {
            let mut context = lock(&context);
            context.run(&script, &request, timeout)
        })
        .await?
    }
}

impl ScriptContext {
    fn new() -> Self {
        let routes: ScriptRoutes = Arc::default();
        let deadline: Arc<Mutex<Option<Instant>>> = Arc::default();

        let mut engine = Engine::new();

        let registry = routes.clone();
        engine.register_fn("route", move |path: ImmutableString, callback: FnPtr| {
            lock(&registry).insert(path.to_string(), callback);
        });

        engine.register_fn("forward", |path: ImmutableString| -> String {
            format!("{FORWARD_SENTINEL}{path}")
        });

        engine.on_print(|text| debug!("script: {text}"));

        let clock = deadline.clone();
        engine.on_progress(move |ops| {
            if ops % WATCHDOG_INTERVAL != 0 {
                return None;
            }
            match *lock(&clock) {
                Some(deadline) if Instant::now() >= deadline => {
                    Some(Dynamic::from("script deadline exceeded".to_string()))
                }
                _ => None,
            }
        });

        let mut scope = Scope::new();
        scope.push("state", Map::new());

        Self {
            engine,
            scope,
            routes,
            deadline,
        }
    }

    fn run(&mut self, script: &Path, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse, AdapterError> {
        *lock(&self.deadline) = Some(Instant::now() + timeout);
        let outcome = self.run_inner(script, request, timeout);
        *lock(&self.deadline) = None;
        outcome
    }

    fn run_inner(&mut self, script: &Path, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse, AdapterError> {
        let ast = self
            .engine
            .compile_file(script.to_path_buf())
            .map_err(|err| script_error(*err, timeout))?;

        // Routes always come from the script that is running now
        lock(&self.routes).clear();

        let request_map = request_map(request);
        let base = self.scope.len();
        self.scope.push("request", request_map.clone());
        let outcome = self.engine.run_ast_with_scope(&mut self.scope, &ast);
        self.scope.rewind(base);
        outcome.map_err(|err| script_error(*err, timeout))?;

        let callback = lock(&self.routes).get(&request.path).cloned();
        let Some(callback) = callback else {
            return Ok(HttpResponse::text(StatusCode::NotFound, "Script route not found"));
        };

        let value: Dynamic = callback
            .call(&self.engine, &ast, (request_map,))
            .map_err(|err| script_error(*err, timeout))?;

        Ok(HttpResponse::text(StatusCode::Ok, value.to_string()))
    }
}

fn request_map(request: &HttpRequest) -> Map {
    let mut params = Map::new();
    for (name, value) in request.params.iter() {
        params.insert(name.into(), Dynamic::from(value.to_string()));
    }

    let mut map = Map::new();
    map.insert("method".into(), Dynamic::from(request.method.as_str().to_string()));
    map.insert("path".into(), Dynamic::from(request.path.clone()));
    map.insert("query".into(), Dynamic::from(request.query.clone()));
    map.insert("body".into(), Dynamic::from(String::from_utf8_lossy(&request.body).into_owned()));
    map.insert("params".into(), Dynamic::from_map(params));
    map
}

fn script_error(err: EvalAltResult, timeout: Duration) -> AdapterError {
    if terminated(&err) {
        AdapterError::Timeout(timeout)
    } else {
        AdapterError::Execution(err.to_string())
    }
}

fn terminated(err: &EvalAltResult) -> bool {
    match err {
        EvalAltResult::ErrorTerminated(..) => true,
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => terminated(inner),
        _ => false,
    }
}
