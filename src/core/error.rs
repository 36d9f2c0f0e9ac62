use http::{HeaderValue, Method, StatusCode, header};
use thiserror::Error;

use crate::core::request::RouteResponse;

/// Errors raised by route registration, matching, reverse routing and
/// handler resolution.
///
/// Load-time variants (`RouteConfiguration`, `InvalidPattern`,
/// `DuplicateRouteName`, `UnknownMiddleware`) must abort bootstrap. Dispatch
/// variants are per-request and are turned into a response with
/// [`RoutingError::into_response`].
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum RoutingError {
    #[error("Invalid route definition {route}: {}", .violations.join("; "))]
    RouteConfiguration {
        route: String,
        violations: Vec<String>,
    },

    #[error("Invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Route name '{name}' is already registered")]
    DuplicateRouteName { name: String },

    #[error("No route matches {method} {path}")]
    RouteNotFound { method: Method, path: String },

    #[error("No route is named '{name}'")]
    NamedRouteNotFound { name: String },

    #[error("Method {method} is not allowed for {path} (allowed: {})", join_methods(.allowed))]
    MethodNotAllowed {
        method: Method,
        path: String,
        allowed: Vec<Method>,
    },

    #[error("Missing parameter '{parameter}' to build a URL for route '{route}'")]
    MissingRouteParameter { route: String, parameter: String },

    #[error("Cannot resolve handler {handler}: {reason}")]
    ControllerResolution { handler: String, reason: String },

    #[error("Handler {handler} failed: {message}")]
    HandlerFailed { handler: String, message: String },

    #[error("Unknown middleware '{name}'")]
    UnknownMiddleware { name: String },
}

/// Result type for routing operations
pub type RoutingResult<T> = Result<T, RoutingError>;

/// Outcome of running a request through the middleware chain.
pub type DispatchResult = RoutingResult<RouteResponse>;

fn join_methods(methods: &[Method]) -> String {
    methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl RoutingError {
    /// HTTP status a caller should answer with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RoutingError::RouteNotFound { .. } | RoutingError::NamedRouteNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            RoutingError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error belongs to route table construction rather than to
    /// a single request.
    pub fn is_load_time(&self) -> bool {
        matches!(
            self,
            RoutingError::RouteConfiguration { .. }
                | RoutingError::InvalidPattern { .. }
                | RoutingError::DuplicateRouteName { .. }
                | RoutingError::UnknownMiddleware { .. }
        )
    }

    /// Allowed methods reported by a 405.
    pub fn allowed_methods(&self) -> Option<&[Method]> {
        match self {
            RoutingError::MethodNotAllowed { allowed, .. } => Some(allowed),
            _ => None,
        }
    }

    /// Render the error as a JSON response. A 405 carries an `Allow` header.
    pub fn into_response(&self) -> RouteResponse {
        let status = self.status_code();
        let message = if status.is_server_error() {
            // Internal details stay in the logs.
            status
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string()
        } else {
            self.to_string()
        };
        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });
        let mut response = RouteResponse::json(status, &body);

        if let Some(allowed) = self.allowed_methods() {
            match HeaderValue::from_str(&join_methods(allowed)) {
                Ok(value) => {
                    response.headers_mut().insert(header::ALLOW, value);
                }
                Err(e) => tracing::warn!("Failed to build Allow header: {}", e),
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let not_found = RoutingError::RouteNotFound {
            method: Method::GET,
            path: "/nope".to_string(),
        };
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        assert!(!not_found.is_load_time());

        let duplicate = RoutingError::DuplicateRouteName {
            name: "posts.show".to_string(),
        };
        assert_eq!(duplicate.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(duplicate.is_load_time());
    }

    #[test]
    fn test_method_not_allowed_response() {
        let err = RoutingError::MethodNotAllowed {
            method: Method::DELETE,
            path: "/posts".to_string(),
            allowed: vec![Method::GET, Method::POST],
        };
        assert_eq!(
            err.to_string(),
            "Method DELETE is not allowed for /posts (allowed: GET, POST)"
        );

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(header::ALLOW).unwrap(), "GET, POST");
    }

    #[test]
    fn test_configuration_error_lists_all_violations() {
        let err = RoutingError::RouteConfiguration {
            route: "GET /x".to_string(),
            violations: vec!["first".to_string(), "second".to_string()],
        };
        assert_eq!(err.to_string(), "Invalid route definition GET /x: first; second");
    }

    #[test]
    fn test_server_errors_hide_details() {
        let err = RoutingError::ControllerResolution {
            handler: "PostController@show".to_string(),
            reason: "service 'PostController' is not registered".to_string(),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!response.body_text().contains("PostController"));
    }
}
