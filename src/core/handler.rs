//! Handler descriptors: the tagged description of what a matched route calls.
use std::{fmt, sync::Arc};

use serde_json::Value;

use crate::core::{
    error::DispatchResult,
    pattern::RouteParams,
    request::{RouteRequest, RouteResponse},
};

/// Signature shared by every handler shape: `(request, response, params)`.
pub type HandlerFn = dyn Fn(&RouteRequest, RouteResponse, &RouteParams) -> DispatchResult + Send + Sync;

/// An in-process closure handler. Not serializable, so never cached.
#[derive(Clone)]
pub struct ClosureHandler {
    inner: Arc<HandlerFn>,
}

impl ClosureHandler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&RouteRequest, RouteResponse, &RouteParams) -> DispatchResult + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    pub fn call(
        &self,
        request: &RouteRequest,
        response: RouteResponse,
        params: &RouteParams,
    ) -> DispatchResult {
        (self.inner)(request, response, params)
    }
}

impl fmt::Debug for ClosureHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClosureHandler")
    }
}

/// What to call for a matched route.
#[derive(Debug, Clone)]
pub enum HandlerDescriptor {
    /// `"Class@method"`: resolve `class` from the service resolver and call `method`.
    NamedMethod { class: String, method: String },
    /// `[target, method]`: same resolution path, declared as a pair.
    ArrayCallable { target: String, method: String },
    /// Called directly.
    Closure(ClosureHandler),
}

impl HandlerDescriptor {
    pub fn named(class: impl Into<String>, method: impl Into<String>) -> Self {
        HandlerDescriptor::NamedMethod {
            class: class.into(),
            method: method.into(),
        }
    }

    pub fn callable(target: impl Into<String>, method: impl Into<String>) -> Self {
        HandlerDescriptor::ArrayCallable {
            target: target.into(),
            method: method.into(),
        }
    }

    pub fn closure<F>(f: F) -> Self
    where
        F: Fn(&RouteRequest, RouteResponse, &RouteParams) -> DispatchResult + Send + Sync + 'static,
    {
        HandlerDescriptor::Closure(ClosureHandler::new(f))
    }

    /// Parse the `"Class@method"` string form.
    pub fn parse_named(spec: &str) -> Option<Self> {
        let (class, method) = spec.split_once('@')?;
        if class.trim().is_empty() || method.trim().is_empty() || method.contains('@') {
            return None;
        }
        Some(Self::named(class.trim(), method.trim()))
    }

    /// Only the two named shapes survive serialization.
    pub fn is_cacheable(&self) -> bool {
        !matches!(self, HandlerDescriptor::Closure(_))
    }

    /// Service type name and action for the named shapes.
    pub fn target(&self) -> Option<(&str, &str)> {
        match self {
            HandlerDescriptor::NamedMethod { class, method } => Some((class.as_str(), method.as_str())),
            HandlerDescriptor::ArrayCallable { target, method } => {
                Some((target.as_str(), method.as_str()))
            }
            HandlerDescriptor::Closure(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            HandlerDescriptor::NamedMethod { class, method } => serde_json::json!({
                "type": "named_method",
                "class": class,
                "method": method,
            }),
            HandlerDescriptor::ArrayCallable { target, method } => serde_json::json!({
                "type": "array_callable",
                "target": target,
                "method": method,
            }),
            HandlerDescriptor::Closure(_) => serde_json::json!({ "type": "closure" }),
        }
    }
}

impl fmt::Display for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerDescriptor::NamedMethod { class, method } => write!(f, "{class}@{method}"),
            HandlerDescriptor::ArrayCallable { target, method } => {
                write!(f, "[{target}, {method}]")
            }
            HandlerDescriptor::Closure(_) => f.write_str("Closure"),
        }
    }
}

impl From<ClosureHandler> for HandlerDescriptor {
    fn from(handler: ClosureHandler) -> Self {
        HandlerDescriptor::Closure(handler)
    }
}
