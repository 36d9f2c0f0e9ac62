//! Junction - HTTP routing and middleware dispatch core.
//!
//! Junction maps an incoming `(method, path)` pair to a handler, runs an
//! ordered chain of middleware around it, resolves the handler implementation
//! through a narrow service-resolver capability and generates URLs from route
//! names. It does not own sockets or connections: requests come in as
//! [`RouteRequest`] (or `http::Request<Bytes>`) and leave as [`RouteResponse`].
//!
//! # Features
//! - `{name}` path templates compiled to anchored matchers, with reverse routing
//! - Registration-order matching with 404 / 405 distinction and `HEAD` to `GET` fallback
//! - Priority-ordered middleware with short-circuiting and per-name enable/disable
//! - Three handler shapes: `"Class@method"`, `[target, method]` and closures
//! - Route files in YAML, JSON or TOML, validated before registration
//! - Route snapshots cached in memory or on disk, keyed by a source fingerprint
//! - Route source watching and atomic router swaps for hot reload
//! - Metrics via the `metrics` facade and structured logging via `tracing`
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use junction::{
//!     adapters::{ActionController, ServiceContainer},
//!     core::{HandlerDescriptor, RouteParams, RouteRegistrar, RouteRequest, Router},
//! };
//!
//! # fn main() -> Result<(), junction::core::RoutingError> {
//! let mut services = ServiceContainer::new();
//! services.singleton(
//!     "PostController",
//!     ActionController::new().action("show", |_req, mut resp, params| {
//!         resp.write(format!("post {}", params["id"]));
//!         Ok(resp)
//!     }),
//! );
//!
//! let mut router = Router::new(Arc::new(services));
//! router
//!     .get("/posts/{id}", HandlerDescriptor::named("PostController", "show"))?
//!     .name("posts.show")?;
//! let router = router.freeze();
//!
//! let response = router.dispatch(RouteRequest::get("/posts/42"))?;
//! assert_eq!(response.body_text(), "post 42");
//!
//! let params = RouteParams::from([("id".to_string(), "42".to_string())]);
//! assert_eq!(router.url("posts.show", &params, None)?, "/posts/42");
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! **Ports** (traits) are separated from **adapters** (implementations) while
//! the routing logic lives in `core`. Configuration types and the route loader
//! live in `config`.
//!
//! # Error Handling
//! Routing operations return [`core::RoutingError`]; cache backends return
//! [`ports::route_cache::CacheError`]. Loading and configuration APIs return
//! `eyre::Result<T>` with `WrapErr` context naming the offending source.
pub mod config;
pub mod metrics;
pub mod ports;
pub mod tracing_setup;

pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate and embedders
pub use crate::{
    config::{LoadStats, RouteLoader, RouterConfig},
    core::{
        HandlerDescriptor, Middleware, MiddlewareRef, RouteRegistrar, RouteRequest, RouteResponse,
        Router, RouterHandle, RoutingError,
    },
    ports::{route_cache::RouteCache, service_resolver::ServiceResolver},
};
