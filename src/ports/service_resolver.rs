use std::sync::Arc;

use thiserror::Error;

use crate::core::{
    error::RoutingError,
    pattern::RouteParams,
    request::{RouteRequest, RouteResponse},
};

/// Error type for controller actions
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ActionError {
    /// The controller has no action with this name
    #[error("action '{0}' is not defined")]
    UnknownAction(String),

    /// The action ran and failed
    #[error("{0}")]
    Failed(String),

    /// A routing error raised from inside the action (e.g. reverse routing)
    #[error(transparent)]
    Routing(#[from] RoutingError),
}

/// Result type for controller actions
pub type ActionResult = Result<RouteResponse, ActionError>;

/// Controller defines the port (interface) for business handlers reached
/// through a named handler descriptor.
pub trait Controller: Send + Sync {
    /// Invoke `action` with the shared handler argument shape.
    ///
    /// Implementations must return [`ActionError::UnknownAction`] for names
    /// they do not provide so the resolver can report it.
    fn call(
        &self,
        action: &str,
        request: &RouteRequest,
        response: RouteResponse,
        params: &RouteParams,
    ) -> ActionResult;
}

/// ServiceResolver defines the port for the "given a type, produce an
/// instance" capability the handler resolver relies on.
pub trait ServiceResolver: Send + Sync {
    /// Resolve a controller instance by its registered type name.
    fn resolve(&self, type_name: &str) -> Option<Arc<dyn Controller>>;
}
