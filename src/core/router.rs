//! Router facade: registration, dispatch and reverse routing.
//!
//! A [`Router`] is built mutably during bootstrap (verb helpers, groups, the
//! route loader) and then frozen into an `Arc<Router>` that is only read while
//! serving. [`RouterHandle`] lets a host swap a rebuilt router in atomically.
//!
//! Dispatch algorithm:
//! 1. routes registered for the request method are tried in registration
//!    order and the first path match wins (`HEAD` falls back to `GET`);
//! 2. if none matches but a route for another method does, the result is a
//!    405 carrying the allowed methods, otherwise a 404;
//! 3. the matched route's middleware is merged with the global middleware by
//!    priority and the chain ends in the [`ControllerResolver`].
use std::{fmt, sync::Arc};

use arc_swap::ArcSwap;
use bytes::Bytes;
use http::Method;

use crate::{
    core::{
        collection::RouteCollection,
        error::{DispatchResult, RoutingError, RoutingResult},
        handler::HandlerDescriptor,
        middleware::{MiddlewareDispatcher, MiddlewareManager, MiddlewareRef, RequestHandler},
        pattern::{MatchResult, RouteParams},
        request::{RouteRequest, RouteResponse},
        resolver::{ControllerResolver, HandlerResolutionContext},
        route::{KNOWN_METHODS, Route, RouteSummary},
        route_attributes::{RouteMetadataMiddleware, RouteParamsMiddleware},
    },
    metrics,
    ports::service_resolver::ServiceResolver,
    tracing_setup,
};

/// Verb-convenience registration shared by [`Router`] and [`RouteGroup`].
pub trait RouteRegistrar {
    /// Register `handler` for `methods` at `path`.
    fn register(
        &mut self,
        methods: &[Method],
        path: &str,
        handler: HandlerDescriptor,
    ) -> RoutingResult<RouteRegistration<'_>>;

    fn get(&mut self, path: &str, handler: HandlerDescriptor) -> RoutingResult<RouteRegistration<'_>> {
        self.register(&[Method::GET], path, handler)
    }

    fn post(&mut self, path: &str, handler: HandlerDescriptor) -> RoutingResult<RouteRegistration<'_>> {
        self.register(&[Method::POST], path, handler)
    }

    fn put(&mut self, path: &str, handler: HandlerDescriptor) -> RoutingResult<RouteRegistration<'_>> {
        self.register(&[Method::PUT], path, handler)
    }

    fn patch(&mut self, path: &str, handler: HandlerDescriptor) -> RoutingResult<RouteRegistration<'_>> {
        self.register(&[Method::PATCH], path, handler)
    }

    fn delete(&mut self, path: &str, handler: HandlerDescriptor) -> RoutingResult<RouteRegistration<'_>> {
        self.register(&[Method::DELETE], path, handler)
    }

    fn options(&mut self, path: &str, handler: HandlerDescriptor) -> RoutingResult<RouteRegistration<'_>> {
        self.register(&[Method::OPTIONS], path, handler)
    }

    /// Register one route answering several verbs.
    fn match_methods(
        &mut self,
        methods: &[Method],
        path: &str,
        handler: HandlerDescriptor,
    ) -> RoutingResult<RouteRegistration<'_>> {
        self.register(methods, path, handler)
    }

    /// Register for every known verb.
    fn any(&mut self, path: &str, handler: HandlerDescriptor) -> RoutingResult<RouteRegistration<'_>> {
        let methods: Vec<Method> = KNOWN_METHODS
            .iter()
            .filter_map(|m| Method::from_bytes(m.as_bytes()).ok())
            .collect();
        self.register(&methods, path, handler)
    }
}

/// Handle on a just-registered route for chaining name, middleware and
/// priority. Each call edits the stored route; a duplicate name is reported
/// by [`RouteRegistration::name`].
pub struct RouteRegistration<'r> {
    routes: &'r mut RouteCollection,
    index: usize,
    route: Arc<Route>,
}

impl<'r> RouteRegistration<'r> {
    pub fn name(self, name: impl Into<String>) -> RoutingResult<Self> {
        let name = name.into();
        self.edit(move |route| route.set_name(Some(name)))
    }

    pub fn middleware(self, middleware: MiddlewareRef) -> RoutingResult<Self> {
        self.edit(move |route| route.middlewares_mut().push(middleware))
    }

    pub fn priority(self, priority: i32) -> RoutingResult<Self> {
        self.edit(move |route| route.set_priority(priority))
    }

    /// The route as currently stored.
    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    fn edit(self, f: impl FnOnce(&mut Route)) -> RoutingResult<Self> {
        let Self { routes, index, .. } = self;
        let route = routes.update(index, f)?;
        Ok(Self {
            routes,
            index,
            route,
        })
    }
}

/// Registration scope sharing a path prefix, middleware and a group label.
pub struct RouteGroup<'r> {
    routes: &'r mut RouteCollection,
    prefix: String,
    middleware: Vec<MiddlewareRef>,
    label: Option<String>,
}

impl RouteGroup<'_> {
    /// Middleware added to every route registered afterwards in this group.
    pub fn middleware(&mut self, middleware: MiddlewareRef) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    pub fn label(&mut self, label: impl Into<String>) -> &mut Self {
        self.label = Some(label.into());
        self
    }

    /// Nested group; prefixes, middleware and label are inherited.
    pub fn group<F>(&mut self, prefix: &str, build: F) -> RoutingResult<()>
    where
        F: FnOnce(&mut RouteGroup<'_>) -> RoutingResult<()>,
    {
        let mut nested = RouteGroup {
            routes: &mut *self.routes,
            prefix: join_paths(&self.prefix, prefix),
            middleware: self.middleware.clone(),
            label: self.label.clone(),
        };
        build(&mut nested)
    }
}

impl RouteRegistrar for RouteGroup<'_> {
    fn register(
        &mut self,
        methods: &[Method],
        path: &str,
        handler: HandlerDescriptor,
    ) -> RoutingResult<RouteRegistration<'_>> {
        let mut route = Route::new(methods.iter().cloned(), &join_paths(&self.prefix, path), handler)?
            .with_middlewares(self.middleware.iter().cloned());
        if let Some(label) = &self.label {
            route = route.with_group(label.clone());
        }
        add_route(self.routes, route)
    }
}

fn add_route(routes: &mut RouteCollection, route: Route) -> RoutingResult<RouteRegistration<'_>> {
    let index = routes.len();
    let route = routes.add(route)?;
    Ok(RouteRegistration {
        routes,
        index,
        route,
    })
}

fn join_paths(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    match path {
        "" | "/" if prefix.is_empty() => "/".to_string(),
        "" | "/" => prefix.to_string(),
        _ if path.starts_with('/') => format!("{prefix}{path}"),
        _ => format!("{prefix}/{path}"),
    }
}

/// Terminal step of every chain: the resolver bound to the matched route.
struct RouteEndpoint<'a> {
    resolver: &'a ControllerResolver,
    route: &'a Route,
    params: &'a RouteParams,
}

impl RequestHandler for RouteEndpoint<'_> {
    fn handle(&self, request: RouteRequest) -> DispatchResult {
        self.resolver.invoke(HandlerResolutionContext {
            handler: self.route.handler(),
            request,
            params: self.params,
        })
    }
}

/// The routing facade.
#[derive(Clone)]
pub struct Router {
    routes: RouteCollection,
    middleware: MiddlewareManager,
    resolver: ControllerResolver,
    inject_route_attributes: bool,
}

impl Router {
    pub fn new(services: Arc<dyn ServiceResolver>) -> Self {
        Self::with_collection(RouteCollection::new(), services)
    }

    pub fn with_collection(routes: RouteCollection, services: Arc<dyn ServiceResolver>) -> Self {
        Self {
            routes,
            middleware: MiddlewareManager::new(),
            resolver: ControllerResolver::new(services),
            inject_route_attributes: true,
        }
    }

    /// Toggle the route parameter and metadata attribute middleware.
    pub fn set_inject_route_attributes(&mut self, enabled: bool) -> &mut Self {
        self.inject_route_attributes = enabled;
        self
    }

    /// Register a fully built route.
    pub fn add_route(&mut self, route: Route) -> RoutingResult<RouteRegistration<'_>> {
        add_route(&mut self.routes, route)
    }

    /// Register every route of `collection`, keeping its order.
    pub fn extend(&mut self, collection: &RouteCollection) -> RoutingResult<usize> {
        for route in collection.all() {
            self.routes.add(Route::clone(route))?;
        }
        Ok(collection.len())
    }

    /// Open a registration scope under `prefix`.
    pub fn group<F>(&mut self, prefix: &str, build: F) -> RoutingResult<()>
    where
        F: FnOnce(&mut RouteGroup<'_>) -> RoutingResult<()>,
    {
        let mut group = RouteGroup {
            routes: &mut self.routes,
            prefix: join_paths("", prefix),
            middleware: Vec::new(),
            label: None,
        };
        build(&mut group)
    }

    /// Add global middleware applied to every matched route.
    pub fn middleware(&mut self, middleware: MiddlewareRef) -> &mut Self {
        self.middleware.add(middleware);
        self
    }

    pub fn middleware_manager(&self) -> &MiddlewareManager {
        &self.middleware
    }

    pub fn middleware_manager_mut(&mut self) -> &mut MiddlewareManager {
        &mut self.middleware
    }

    pub fn routes(&self) -> &RouteCollection {
        &self.routes
    }

    pub fn resolver(&self) -> &ControllerResolver {
        &self.resolver
    }

    /// End of bootstrap: the router becomes shared and read-only.
    pub fn freeze(self) -> Arc<Router> {
        tracing::info!(
            routes = self.routes.len(),
            middleware = self.middleware.len(),
            "Router frozen"
        );
        metrics::set_routes_loaded(self.routes.len());
        Arc::new(self)
    }

    /// Find the route for `(method, path)`, distinguishing 404 from 405.
    pub fn match_route(&self, method: &Method, path: &str) -> RoutingResult<(Arc<Route>, MatchResult)> {
        if let Some(found) = self.routes.find(method, path) {
            return Ok(found);
        }
        if *method == Method::HEAD {
            if let Some(found) = self.routes.find(&Method::GET, path) {
                return Ok(found);
            }
        }

        let mut allowed = self.routes.allowed_methods(path);
        // HEAD is served by GET routes, so advertise it next to GET.
        if !allowed.contains(&Method::HEAD) {
            if let Some(get) = allowed.iter().position(|m| *m == Method::GET) {
                allowed.insert(get + 1, Method::HEAD);
            }
        }
        if allowed.is_empty() {
            Err(RoutingError::RouteNotFound {
                method: method.clone(),
                path: path.to_string(),
            })
        } else {
            Err(RoutingError::MethodNotAllowed {
                method: method.clone(),
                path: path.to_string(),
                allowed,
            })
        }
    }

    /// The middleware chain that would run for `route`, outermost first.
    pub fn chain_for(&self, route: &Arc<Route>, params: &RouteParams) -> MiddlewareDispatcher {
        let mut entries = self.middleware.merged(route.middlewares());
        if self.inject_route_attributes {
            entries.insert(0, RouteMetadataMiddleware::new(route.clone()).into_ref());
            entries.insert(0, RouteParamsMiddleware::new(params.clone()).into_ref());
        }
        MiddlewareDispatcher::new(entries)
    }

    /// Match `request` and run it through the middleware chain to a response.
    pub fn dispatch(&self, request: RouteRequest) -> DispatchResult {
        let method = request.method().clone();
        let _timer = metrics::DispatchTimer::new(method.as_str());
        let span = tracing_setup::create_dispatch_span(method.as_str(), request.path());
        let _entered = span.enter();

        let (route, matched) = match self.match_route(&method, request.path()) {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!("Dispatch failed: {}", e);
                metrics::record_dispatch(method.as_str(), e.status_code().as_u16());
                return Err(e);
            }
        };
        span.record("route", tracing::field::display(&route));
        tracing::debug!(name = route.name(), "Route matched");

        let params = matched.into_params();
        let chain = self.chain_for(&route, &params);
        let endpoint = RouteEndpoint {
            resolver: &self.resolver,
            route: &route,
            params: &params,
        };
        let result = chain.process(request, &endpoint);

        let status = match &result {
            Ok(response) => response.status().as_u16(),
            Err(e) => {
                tracing::warn!(route = %route, "Handler chain failed: {}", e);
                e.status_code().as_u16()
            }
        };
        span.record("http.status_code", status);
        metrics::record_dispatch(method.as_str(), status);
        result
    }

    /// Dispatch and translate routing errors into responses (404, 405, 500).
    pub fn handle(&self, request: RouteRequest) -> RouteResponse {
        self.dispatch(request)
            .unwrap_or_else(|e| e.into_response())
    }

    /// [`Router::handle`] for `http` crate types.
    pub fn handle_http(&self, request: http::Request<Bytes>) -> http::Response<Bytes> {
        self.handle(RouteRequest::from(request)).into_http()
    }

    /// Reverse routing: build the URL of the route named `name`.
    pub fn url(&self, name: &str, params: &RouteParams, query: Option<&RouteParams>) -> RoutingResult<String> {
        self.routes
            .get_by_name(name)
            .ok_or_else(|| RoutingError::NamedRouteNotFound {
                name: name.to_string(),
            })?
            .generate_url(params, query)
    }

    /// Route table listing in registration order.
    pub fn summaries(&self) -> Vec<RouteSummary> {
        self.routes.all().iter().map(|r| r.summary()).collect()
    }
}

impl RouteRegistrar for Router {
    fn register(
        &mut self,
        methods: &[Method],
        path: &str,
        handler: HandlerDescriptor,
    ) -> RoutingResult<RouteRegistration<'_>> {
        let route = Route::new(methods.iter().cloned(), path, handler)?;
        self.add_route(route)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes.len())
            .field("middleware", &self.middleware)
            .field("inject_route_attributes", &self.inject_route_attributes)
            .finish()
    }
}

/// Atomically swappable reference to the live router.
pub struct RouterHandle {
    current: ArcSwap<Router>,
}

impl RouterHandle {
    pub fn new(router: Arc<Router>) -> Self {
        Self {
            current: ArcSwap::new(router),
        }
    }

    /// The router serving new requests. In-flight dispatches keep the
    /// instance they started with.
    pub fn load(&self) -> Arc<Router> {
        self.current.load_full()
    }

    /// Replace the live router, returning the previous one.
    pub fn swap(&self, router: Arc<Router>) -> Arc<Router> {
        tracing::info!(routes = router.routes().len(), "Swapping live router");
        self.current.swap(router)
    }

    pub fn dispatch(&self, request: RouteRequest) -> DispatchResult {
        self.current.load().dispatch(request)
    }
}
