//! Middleware that expose the matched route to application code through
//! request attributes. They are ordinary middleware; the router just places
//! them at the outermost position of every chain.
use std::sync::Arc;

use serde_json::Value;

use crate::core::{
    error::DispatchResult,
    middleware::{Middleware, MiddlewareRef, Next},
    pattern::RouteParams,
    request::RouteRequest,
    route::Route,
};

pub const ROUTE_PARAMS: &str = "route.params";
pub const ROUTE_NAME: &str = "route.name";
pub const ROUTE_PATTERN: &str = "route.pattern";
pub const ROUTE_METHODS: &str = "route.methods";
pub const ROUTE_HANDLER: &str = "route.handler";
pub const ROUTE_GROUP: &str = "route.group";

/// Priority that places the attribute injectors ahead of any user middleware.
pub const ATTRIBUTE_PRIORITY: i32 = i32::MAX;

/// Stores the extracted parameters under [`ROUTE_PARAMS`] as a JSON object.
pub struct RouteParamsMiddleware {
    params: RouteParams,
}

impl RouteParamsMiddleware {
    pub fn new(params: RouteParams) -> Self {
        Self { params }
    }

    pub fn into_ref(self) -> MiddlewareRef {
        MiddlewareRef::new(ROUTE_PARAMS, self).with_priority(ATTRIBUTE_PRIORITY)
    }
}

impl Middleware for RouteParamsMiddleware {
    fn handle(&self, mut request: RouteRequest, next: Next<'_>) -> DispatchResult {
        let params = self
            .params
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<serde_json::Map<_, _>>();
        request.set_attribute(ROUTE_PARAMS, Value::Object(params));
        next.run(request)
    }
}

/// Stores name, pattern, methods, handler descriptor and group of the route.
pub struct RouteMetadataMiddleware {
    route: Arc<Route>,
}

impl RouteMetadataMiddleware {
    pub fn new(route: Arc<Route>) -> Self {
        Self { route }
    }

    pub fn into_ref(self) -> MiddlewareRef {
        MiddlewareRef::new("route.metadata", self).with_priority(ATTRIBUTE_PRIORITY)
    }
}

impl Middleware for RouteMetadataMiddleware {
    fn handle(&self, mut request: RouteRequest, next: Next<'_>) -> DispatchResult {
        let route = &self.route;
        request.set_attribute(ROUTE_NAME, route.name().map_or(Value::Null, Value::from));
        request.set_attribute(ROUTE_PATTERN, route.path());
        request.set_attribute(
            ROUTE_METHODS,
            route
                .methods()
                .iter()
                .map(|m| Value::from(m.as_str()))
                .collect::<Vec<_>>(),
        );
        request.set_attribute(ROUTE_HANDLER, route.handler().to_json());
        request.set_attribute(ROUTE_GROUP, route.group().map_or(Value::Null, Value::from));
        next.run(request)
    }
}

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode};

    use super::*;
    use crate::core::{
        error::DispatchResult, handler::HandlerDescriptor, middleware::MiddlewareManager,
        request::RouteResponse,
    };

    #[test]
    fn test_attributes_are_injected() {
        let route = Arc::new(
            Route::new(
                [Method::GET, Method::HEAD],
                "/posts/{id}",
                HandlerDescriptor::named("PostController", "show"),
            )
            .unwrap()
            .with_name("posts.show")
            .with_group("web"),
        );
        let mut params = RouteParams::new();
        params.insert("id".to_string(), "42".to_string());

        let mut manager = MiddlewareManager::new();
        manager.add(RouteParamsMiddleware::new(params).into_ref());
        manager.add(RouteMetadataMiddleware::new(route).into_ref());

        let handler = |req: RouteRequest| -> DispatchResult {
            assert_eq!(req.attribute(ROUTE_PARAMS).unwrap()["id"], "42");
            assert_eq!(req.attribute_str(ROUTE_NAME), Some("posts.show"));
            assert_eq!(req.attribute_str(ROUTE_PATTERN), Some("/posts/{id}"));
            assert_eq!(
                req.attribute(ROUTE_METHODS).unwrap(),
                &serde_json::json!(["GET", "HEAD"])
            );
            assert_eq!(req.attribute(ROUTE_HANDLER).unwrap()["class"], "PostController");
            assert_eq!(req.attribute_str(ROUTE_GROUP), Some("web"));
            Ok(RouteResponse::with_status(StatusCode::NO_CONTENT))
        };

        let response = manager.process(RouteRequest::get("/posts/42"), &handler).unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
