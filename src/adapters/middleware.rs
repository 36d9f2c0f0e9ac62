//! Reusable middleware for the dispatch chain.
//!
//! Stateless apart from their construction-time configuration. Each can be
//! registered globally on a router or referenced by name from route files
//! through [`builtin_registry`].
use std::{collections::HashMap, time::Instant};

use http::{HeaderName, HeaderValue, header};

use crate::core::{
    error::DispatchResult,
    middleware::{Middleware, MiddlewareRef, MiddlewareRegistry, Next},
    request::RouteRequest,
};

/// Request attribute holding the id assigned by [`RequestIdMiddleware`].
pub const REQUEST_ID_ATTRIBUTE: &str = "request.id";

/// Log start and end of a dispatch including latency.
pub struct RequestTimingMiddleware;

impl Middleware for RequestTimingMiddleware {
    fn handle(&self, request: RouteRequest, next: Next<'_>) -> DispatchResult {
        let start = Instant::now();
        let method = request.method().clone();
        let path = request.path().to_string();

        tracing::info!("Started processing {} {}", method, path);
        let result = next.run(request);
        let duration = start.elapsed();

        match &result {
            Ok(response) => tracing::info!(
                "Completed {} {} - {} in {:?}",
                method,
                path,
                response.status(),
                duration
            ),
            Err(e) => tracing::info!("Failed {} {} - {} in {:?}", method, path, e, duration),
        }
        result
    }
}

/// Add common hardening headers to successful responses.
pub struct SecurityHeadersMiddleware;

impl Middleware for SecurityHeadersMiddleware {
    fn handle(&self, request: RouteRequest, next: Next<'_>) -> DispatchResult {
        let mut response = next.run(request)?;
        let headers = response.headers_mut();

        headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
        headers.insert(header::X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));
        headers.insert(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        );

        Ok(response)
    }
}

/// Permissive CORS headers reflecting the caller origin when present.
pub struct CorsMiddleware {
    allow_methods: HeaderValue,
}

impl CorsMiddleware {
    pub fn new() -> Self {
        Self {
            allow_methods: HeaderValue::from_static("GET, POST, PUT, PATCH, DELETE, OPTIONS"),
        }
    }
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for CorsMiddleware {
    fn handle(&self, request: RouteRequest, next: Next<'_>) -> DispatchResult {
        let origin = request.headers().get(header::ORIGIN).cloned();
        let mut response = next.run(request)?;
        let headers = response.headers_mut();

        if let Some(origin) = origin {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type, Authorization, X-Requested-With"),
        );
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));

        Ok(response)
    }
}

/// Fixed response headers, typically from configuration.
pub struct CustomHeadersMiddleware {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl CustomHeadersMiddleware {
    /// Invalid pairs are skipped with a warning.
    pub fn new(custom: &HashMap<String, String>) -> Self {
        let headers = custom
            .iter()
            .filter_map(|(name, value)| {
                match (name.parse::<HeaderName>(), HeaderValue::from_str(value)) {
                    (Ok(name), Ok(value)) => Some((name, value)),
                    _ => {
                        tracing::warn!("Invalid custom header: {} = {}", name, value);
                        None
                    }
                }
            })
            .collect();
        Self { headers }
    }
}

impl Middleware for CustomHeadersMiddleware {
    fn handle(&self, request: RouteRequest, next: Next<'_>) -> DispatchResult {
        let mut response = next.run(request)?;
        for (name, value) in &self.headers {
            response.headers_mut().insert(name.clone(), value.clone());
        }
        Ok(response)
    }
}

/// Assign a UUID per request, exposed as the [`REQUEST_ID_ATTRIBUTE`]
/// attribute and the `X-Request-ID` response header.
pub struct RequestIdMiddleware;

impl Middleware for RequestIdMiddleware {
    fn handle(&self, mut request: RouteRequest, next: Next<'_>) -> DispatchResult {
        let request_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("request", request_id = %request_id);
        let _enter = span.enter();

        request.set_attribute(REQUEST_ID_ATTRIBUTE, request_id.as_str());
        let mut response = next.run(request)?;

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }
        Ok(response)
    }
}

/// Registry pre-populated with the middleware in this module under the names
/// `request_id`, `timing`, `security_headers` and `cors`.
pub fn builtin_registry() -> MiddlewareRegistry {
    let mut registry = MiddlewareRegistry::new();
    registry
        .register(MiddlewareRef::new("request_id", RequestIdMiddleware).with_priority(100))
        .register(MiddlewareRef::new("timing", RequestTimingMiddleware).with_priority(90))
        .register(MiddlewareRef::new("security_headers", SecurityHeadersMiddleware))
        .register(MiddlewareRef::new("cors", CorsMiddleware::new()));
    registry
}
