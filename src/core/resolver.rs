//! Turns a handler descriptor into a call.
//!
//! This is the single seam between routing and business code. It only knows
//! how to locate a target for each descriptor shape and how to invoke it with
//! `(request, response, params)`; it never inspects what the target does.
use std::sync::Arc;

use crate::{
    core::{
        error::{DispatchResult, RoutingError},
        handler::HandlerDescriptor,
        pattern::RouteParams,
        request::{RouteRequest, RouteResponse},
    },
    ports::service_resolver::{ActionError, ServiceResolver},
};

/// Everything needed to invoke one matched route, built per dispatch.
pub struct HandlerResolutionContext<'a> {
    pub handler: &'a HandlerDescriptor,
    pub request: RouteRequest,
    pub params: &'a RouteParams,
}

/// Resolves handler descriptors against a [`ServiceResolver`].
#[derive(Clone)]
pub struct ControllerResolver {
    services: Arc<dyn ServiceResolver>,
}

impl ControllerResolver {
    pub fn new(services: Arc<dyn ServiceResolver>) -> Self {
        Self { services }
    }

    /// Locate the target for the context's descriptor and call it.
    pub fn invoke(&self, context: HandlerResolutionContext<'_>) -> DispatchResult {
        let HandlerResolutionContext {
            handler,
            request,
            params,
        } = context;
        let response = RouteResponse::new();

        let (type_name, action) = match handler {
            HandlerDescriptor::Closure(closure) => {
                return closure.call(&request, response, params);
            }
            HandlerDescriptor::NamedMethod { class, method } => (class, method),
            HandlerDescriptor::ArrayCallable { target, method } => (target, method),
        };

        let controller =
            self.services
                .resolve(type_name)
                .ok_or_else(|| RoutingError::ControllerResolution {
                    handler: handler.to_string(),
                    reason: format!("service '{type_name}' is not registered"),
                })?;

        controller
            .call(action, &request, response, params)
            .map_err(|e| match e {
                ActionError::UnknownAction(action) => RoutingError::ControllerResolution {
                    handler: handler.to_string(),
                    reason: format!("'{type_name}' has no callable action '{action}'"),
                },
                ActionError::Routing(inner) => inner,
                ActionError::Failed(message) => RoutingError::HandlerFailed {
                    handler: handler.to_string(),
                    message,
                },
            })
    }

    /// Whether the descriptor's target can be located, without calling it.
    pub fn can_resolve(&self, handler: &HandlerDescriptor) -> bool {
        match handler.target() {
            Some((type_name, _)) => self.services.resolve(type_name).is_some(),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;
    use crate::adapters::container::{ActionController, ServiceContainer};

    fn resolver() -> ControllerResolver {
        let mut container = ServiceContainer::new();
        container.singleton(
            "PostController",
            ActionController::new().action("show", |_req, mut resp, params| {
                resp.write(format!("post {}", params.get("id").map(String::as_str).unwrap_or("?")));
                Ok(resp)
            }).action("broken", |_req, _resp, _params| {
                Err(ActionError::Failed("database unavailable".to_string()))
            }),
        );
        ControllerResolver::new(Arc::new(container))
    }

    fn params() -> RouteParams {
        RouteParams::from([("id".to_string(), "42".to_string())])
    }

    fn invoke(resolver: &ControllerResolver, handler: &HandlerDescriptor) -> DispatchResult {
        let params = params();
        resolver.invoke(HandlerResolutionContext {
            handler,
            request: RouteRequest::get("/posts/42"),
            params: &params,
        })
    }

    #[test]
    fn test_named_and_array_resolve_the_same_way() {
        let resolver = resolver();
        for handler in [
            HandlerDescriptor::named("PostController", "show"),
            HandlerDescriptor::callable("PostController", "show"),
        ] {
            let response = invoke(&resolver, &handler).unwrap();
            assert_eq!(response.body_text(), "post 42");
        }
    }

    #[test]
    fn test_closure_is_called_directly() {
        let handler = HandlerDescriptor::closure(|req, mut resp, params| {
            resp.set_status(StatusCode::ACCEPTED);
            resp.write(format!("{} {}", req.path(), params.len()));
            Ok(resp)
        });
        let response = invoke(&resolver(), &handler).unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.body_text(), "/posts/42 1");
    }

    #[test]
    fn test_unknown_class() {
        let resolver = resolver();
        let handler = HandlerDescriptor::named("MissingController", "show");
        assert!(!resolver.can_resolve(&handler));
        let err = invoke(&resolver, &handler).unwrap_err();
        assert!(matches!(err, RoutingError::ControllerResolution { .. }));
    }

    #[test]
    fn test_unknown_action() {
        let err = invoke(&resolver(), &HandlerDescriptor::named("PostController", "destroy")).unwrap_err();
        match err {
            RoutingError::ControllerResolution { handler, reason } => {
                assert_eq!(handler, "PostController@destroy");
                assert!(reason.contains("destroy"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_action_failure() {
        let err = invoke(&resolver(), &HandlerDescriptor::named("PostController", "broken")).unwrap_err();
        assert!(matches!(err, RoutingError::HandlerFailed { .. }));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
