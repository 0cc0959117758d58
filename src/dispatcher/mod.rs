//! Request dispatch.
//!
//! The dispatcher picks a backend for each request and runs it:
//!
//! 1. the first route in the route table that matches the method and path;
//! 2. otherwise the backend registered for the path's file extension;
//! 3. otherwise the static file responder, against the raw path.
//!
//! A path ending in `/` stands for the configured index file inside it, so
//! with the default `app.lua` index `GET /` runs on the scripting engine.
//!
//! A response whose body starts with the forward sentinel is not returned to
//! the client. Instead the request is rewritten to the embedded path and
//! dispatched again, up to `max_forwards` times.

mod error;

use log::{debug, info};

pub use error::DispatchError;

use crate::backend::Backends;
use crate::parser::HttpRequest;
use crate::router::{lookup_extension, Params, RouteTable, RouteType};
use crate::server::{HttpResponse, ServerConfig};

/// The backend chosen for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub route_type: RouteType,
    pub target: String,
}

/// Routes requests to backends. Shared read-only across connection tasks.
pub struct Dispatcher {
    routes: RouteTable,
    backends: Backends,
    index: String,
    max_forwards: usize,
    static_fallback: bool,
    forward_preserves_request: bool,
}

impl Dispatcher {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            routes: config.routes.clone(),
            backends: Backends::new(config),
            index: config.index.clone(),
            max_forwards: config.max_forwards,
            static_fallback: config.static_fallback,
            forward_preserves_request: config.forward_preserves_request,
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Dispatch a request. Every failure is turned into an error response.
    pub async fn dispatch(&self, request: HttpRequest) -> HttpResponse {
        match self.resolve(request).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }

    /// Dispatch a request and follow its forward chain.
    pub async fn resolve(&self, mut request: HttpRequest) -> Result<HttpResponse, DispatchError> {
        let mut hops = 0;

        loop {
            let response = self.dispatch_once(&mut request).await?;
            let Some(target) = response.forward_target() else {
                return Ok(response);
            };

            if hops == self.max_forwards {
                return Err(DispatchError::ForwardLoopExceeded(hops));
            }
            hops += 1;

            let target = if target.starts_with('/') {
                target.to_string()
            } else {
                format!("/{target}")
            };
            debug!("Forwarding {} to {target} (hop {hops})", request.path);
            request = request.forwarded(&target, self.forward_preserves_request);
        }
    }

    /// Choose the backend for `request`, storing any route parameters on it.
    pub fn select(&self, request: &mut HttpRequest) -> Option<Selection> {
        if let Some((route, matched)) = self.routes.lookup(request.method, &request.path) {
            request.params = matched.params;
            return Some(Selection {
                route_type: route.route_type,
                target: route.target.clone(),
            });
        }

        request.params = Params::new();

        let target = if request.path.ends_with('/') {
            format!("{}{}", request.path, self.index)
        } else {
            request.path.clone()
        };

        if let Some(route_type) = lookup_extension(&target) {
            return Some(Selection { route_type, target });
        }

        self.static_fallback.then_some(Selection {
            route_type: RouteType::Static,
            target,
        })
    }

    async fn dispatch_once(&self, request: &mut HttpRequest) -> Result<HttpResponse, DispatchError> {
        let selection = self
            .select(request)
            .ok_or_else(|| DispatchError::NoRouteMatched(request.path.clone()))?;

        info!(
            "{} {} -> {} {}",
            request.method, request.path, selection.route_type, selection.target
        );

        let response = self
            .backends
            .execute(selection.route_type, request, &selection.target)
            .await?;
        Ok(response)
    }
}
