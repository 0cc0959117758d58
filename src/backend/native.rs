//! Native module backend.
//!
//! A module is a shared library that exports
//! `extern "C" fn cmod_main() -> *const c_char`. Each request loads the
//! library, calls the entry point once, copies the returned string, and
//! unloads the library again.

use std::collections::HashMap;
use std::ffi::{c_char, c_void, CStr, CString};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::debug;

use crate::backend::{lock, resolve_target, AdapterError, ModuleError};
use crate::parser::HttpRequest;
use crate::server::{HttpResponse, StatusCode};

/// The symbol every module must export.
pub const ENTRY_SYMBOL: &str = "cmod_main";

type EntryPoint = extern "C" fn() -> *const c_char;

/// A loaded module image. Dropping it unloads the image.
pub struct NativeModule {
    handle: *mut c_void,
    path: PathBuf,
}

impl NativeModule {
    pub fn load(path: &Path) -> Result<Self, ModuleError> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| ModuleError::Load(format!("{}: path contains a NUL byte", path.display())))?;

        // SAFETY: c_path is a valid NUL-terminated string for the duration of the call.
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        if handle.is_null() {
            return Err(ModuleError::Load(last_loader_error()));
        }

        debug!("Loaded native module {}", path.display());
        Ok(Self {
            handle,
            path: path.to_path_buf(),
        })
    }

    /// Call the no-argument entry point `symbol` and copy out its string.
    pub fn invoke(&self, symbol: &str) -> Result<String, ModuleError> {
        let c_symbol = CString::new(symbol).map_err(|_| ModuleError::SymbolNotFound(symbol.to_string()))?;

        // SAFETY: handle came from a successful dlopen and is still open.
        let address = unsafe { libc::dlsym(self.handle, c_symbol.as_ptr()) };
        if address.is_null() {
            return Err(ModuleError::SymbolNotFound(symbol.to_string()));
        }

        // SAFETY: the module contract fixes the entry point's signature.
        let entry: EntryPoint = unsafe { std::mem::transmute::<*mut c_void, EntryPoint>(address) };
        let output = entry();
        if output.is_null() {
            return Ok(String::new());
        }

        // SAFETY: the entry point returns a NUL-terminated string that stays
        // valid until the module is unloaded, which happens after this copy.
        Ok(unsafe { CStr::from_ptr(output) }.to_string_lossy().into_owned())
    }
}

impl Drop for NativeModule {
    fn drop(&mut self) {
        // SAFETY: handle came from a successful dlopen and is closed exactly once.
        if unsafe { libc::dlclose(self.handle) } != 0 {
            debug!("Unloading {} failed: {}", self.path.display(), last_loader_error());
        }
    }
}

fn last_loader_error() -> String {
    // SAFETY: dlerror returns either NULL or a thread-local NUL-terminated string.
    let message = unsafe { libc::dlerror() };
    if message.is_null() {
        return "unknown loader error".to_string();
    }
    unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned()
}

/// The native-module adapter.
///
/// Module images are not assumed to be thread-safe, so every
/// load, invoke and unload cycle for one path runs under that path's lock.
pub struct NativeModules {
    root: PathBuf,
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl NativeModules {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            locks: Mutex::default(),
        }
    }

    pub async fn execute(&self, _request: &HttpRequest, target: &str) -> Result<HttpResponse, AdapterError> {
        let mut path = resolve_target(&self.root, target)?;
        // A bare file name would make the loader search the library path
        if path.parent().map_or(true, |parent| parent.as_os_str().is_empty()) {
            path = Path::new(".").join(path);
        }

        // Only real files get a lock entry
        if !tokio::fs::metadata(&path).await.is_ok_and(|meta| meta.is_file()) {
            return Err(AdapterError::Execution(format!("Cannot load {}: no such module", path.display())));
        }

        let module_lock = lock(&self.locks).entry(path.clone()).or_default().clone();

        let module_path = path.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let _guard = lock(&module_lock);
            run_module(&module_path)
        })
        .await;

        // Drop the entry once no other call holds it
        let mut locks = lock(&self.locks);
        if locks.get(&path).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            locks.remove(&path);
        }
        drop(locks);

        outcome?
    }

    #[cfg(test)]
    pub(crate) fn tracked_paths(&self) -> usize {
        lock(&self.locks).len()
    }
}

fn run_module(path: &Path) -> Result<HttpResponse, AdapterError> {
    let module = NativeModule::load(path).map_err(|e| AdapterError::Execution(e.to_string()))?;

    match module.invoke(ENTRY_SYMBOL) {
        Ok(output) => Ok(HttpResponse::text(StatusCode::Ok, output)),
        Err(ModuleError::SymbolNotFound(_)) => {
            Ok(HttpResponse::text(StatusCode::Ok, format!("no {ENTRY_SYMBOL} found")))
        }
        Err(e) => Err(AdapterError::Execution(e.to_string())),
    }
}
