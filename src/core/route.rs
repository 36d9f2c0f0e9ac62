use std::fmt;

use http::Method;
use serde::Serialize;

use crate::core::{
    error::{RoutingError, RoutingResult},
    handler::HandlerDescriptor,
    middleware::MiddlewareRef,
    pattern::{CompiledPattern, MatchResult, RouteParams},
};

/// HTTP verbs a route may be registered for.
pub const KNOWN_METHODS: [&str; 7] = ["GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"];

/// Parse a verb case-insensitively, accepting only [`KNOWN_METHODS`].
pub fn normalize_method(raw: &str) -> Option<Method> {
    let upper = raw.trim().to_ascii_uppercase();
    if !KNOWN_METHODS.contains(&upper.as_str()) {
        return None;
    }
    Method::from_bytes(upper.as_bytes()).ok()
}

/// A registered mapping from (methods, path pattern) to a handler.
#[derive(Debug, Clone)]
pub struct Route {
    methods: Vec<Method>,
    pattern: CompiledPattern,
    handler: HandlerDescriptor,
    name: Option<String>,
    middlewares: Vec<MiddlewareRef>,
    priority: i32,
    group: Option<String>,
}

impl Route {
    /// Compile `path` and build a route for `methods`. Duplicate verbs are
    /// collapsed, first occurrence wins.
    pub fn new(
        methods: impl IntoIterator<Item = Method>,
        path: &str,
        handler: HandlerDescriptor,
    ) -> RoutingResult<Self> {
        let pattern = CompiledPattern::compile(path)?;
        Self::from_compiled(methods, pattern, handler)
    }

    pub fn from_compiled(
        methods: impl IntoIterator<Item = Method>,
        pattern: CompiledPattern,
        handler: HandlerDescriptor,
    ) -> RoutingResult<Self> {
        let mut unique: Vec<Method> = Vec::new();
        for method in methods {
            if !unique.contains(&method) {
                unique.push(method);
            }
        }
        if unique.is_empty() {
            return Err(RoutingError::RouteConfiguration {
                route: pattern.template().to_string(),
                violations: vec!["at least one HTTP method is required".to_string()],
            });
        }

        Ok(Self {
            methods: unique,
            pattern,
            handler,
            name: None,
            middlewares: Vec::new(),
            priority: 0,
            group: None,
        })
    }

    pub fn get(path: &str, handler: HandlerDescriptor) -> RoutingResult<Self> {
        Self::new([Method::GET], path, handler)
    }

    pub fn post(path: &str, handler: HandlerDescriptor) -> RoutingResult<Self> {
        Self::new([Method::POST], path, handler)
    }

    pub fn put(path: &str, handler: HandlerDescriptor) -> RoutingResult<Self> {
        Self::new([Method::PUT], path, handler)
    }

    pub fn patch(path: &str, handler: HandlerDescriptor) -> RoutingResult<Self> {
        Self::new([Method::PATCH], path, handler)
    }

    pub fn delete(path: &str, handler: HandlerDescriptor) -> RoutingResult<Self> {
        Self::new([Method::DELETE], path, handler)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_middleware(mut self, middleware: MiddlewareRef) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn with_middlewares(mut self, middlewares: impl IntoIterator<Item = MiddlewareRef>) -> Self {
        self.middlewares.extend(middlewares);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub(crate) fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    pub(crate) fn middlewares_mut(&mut self) -> &mut Vec<MiddlewareRef> {
        &mut self.middlewares
    }

    pub(crate) fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    pub fn path(&self) -> &str {
        self.pattern.template()
    }

    pub fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }

    pub fn handler(&self) -> &HandlerDescriptor {
        &self.handler
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn middlewares(&self) -> &[MiddlewareRef] {
        &self.middlewares
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn matches(&self, path: &str) -> MatchResult {
        self.pattern.match_path(path)
    }

    /// Build a URL for this route; errors name the route when it has one.
    pub fn generate_url(&self, params: &RouteParams, query: Option<&RouteParams>) -> RoutingResult<String> {
        self.pattern
            .generate_url(params, query)
            .map_err(|e| match (e, &self.name) {
                (RoutingError::MissingRouteParameter { parameter, .. }, Some(name)) => {
                    RoutingError::MissingRouteParameter {
                        route: name.clone(),
                        parameter,
                    }
                }
                (other, _) => other,
            })
    }

    pub fn summary(&self) -> RouteSummary {
        RouteSummary {
            methods: self.methods.iter().map(|m| m.to_string()).collect(),
            path: self.path().to_string(),
            name: self.name.clone(),
            handler: self.handler.to_string(),
            group: self.group.clone(),
            middleware: self.middlewares.iter().map(|m| m.name().to_string()).collect(),
            priority: self.priority,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let methods: Vec<&str> = self.methods.iter().map(Method::as_str).collect();
        write!(f, "{} {}", methods.join("|"), self.path())
    }
}

/// Flat, serializable view of a route for listings and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSummary {
    pub methods: Vec<String>,
    pub path: String,
    pub name: Option<String>,
    pub handler: String,
    pub group: Option<String>,
    pub middleware: Vec<String>,
    pub priority: i32,
}
