pub mod collection;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod pattern;
pub mod request;
pub mod resolver;
pub mod route;
pub mod route_attributes;
pub mod router;

pub use collection::RouteCollection;
pub use error::{DispatchResult, RoutingError, RoutingResult};
pub use handler::{ClosureHandler, HandlerDescriptor};
pub use middleware::{
    Middleware, MiddlewareDispatcher, MiddlewareManager, MiddlewareRef, MiddlewareRegistry, Next,
    RequestHandler, from_fn,
};
pub use pattern::{CompiledPattern, MatchResult, RouteParams};
pub use request::{RouteRequest, RouteResponse};
pub use resolver::{ControllerResolver, HandlerResolutionContext};
pub use route::{Route, RouteSummary};
pub use router::{RouteGroup, RouteRegistrar, RouteRegistration, Router, RouterHandle};
