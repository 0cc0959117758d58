//! The sera server binary.
//!
//! Usage: `sera [config-file]`. Without an argument, `sera.conf` in the
//! current directory is used; a missing file means default settings.

use std::path::PathBuf;

use log::error;
use sera::{HttpServer, ServerConfig};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sera.conf"));

    let config = match ServerConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            error!("Cannot load {}: {e}", path.display());
            std::process::exit(2);
        }
    };

    if let Err(e) = HttpServer::new(config).start().await {
        error!("Server error: {e}");
        std::process::exit(1);
    }
}
