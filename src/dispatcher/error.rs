//! Dispatch errors.

use log::{error, warn};
use thiserror::Error;

use crate::backend::AdapterError;
use crate::server::{HttpResponse, StatusCode};

/// Why a request ended without a backend response.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No route, no known extension, and static fallback is off.
    #[error("No route matched {0}")]
    NoRouteMatched(String),

    /// A forward chain went past the configured bound.
    #[error("Forward loop exceeded after {0} hops")]
    ForwardLoopExceeded(usize),

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::NoRouteMatched(_) => StatusCode::NotFound,
            DispatchError::ForwardLoopExceeded(_) => StatusCode::InternalServerError,
            DispatchError::Adapter(e) => e.status(),
        }
    }

    /// The response the client sees for this error.
    pub fn into_response(self) -> HttpResponse {
        let status = self.status();
        match &self {
            DispatchError::NoRouteMatched(path) => warn!("No backend for {path}"),
            DispatchError::ForwardLoopExceeded(hops) => error!("Forward loop exceeded after {hops} hops"),
            DispatchError::Adapter(e) if status == StatusCode::NotFound => warn!("{e}"),
            DispatchError::Adapter(e) => error!("Backend failed: {e}"),
        }

        let body = match self {
            DispatchError::NoRouteMatched(_) => "Not Found".to_string(),
            DispatchError::ForwardLoopExceeded(_) => "Forward loop exceeded".to_string(),
            DispatchError::Adapter(e) => e.to_string(),
        };
        HttpResponse::text(status, body)
    }
}
