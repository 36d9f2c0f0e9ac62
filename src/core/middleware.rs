//! Middleware ordering and the onion-style dispatch chain.
//!
//! A [`MiddlewareManager`] keeps its entries sorted by descending priority,
//! preserving insertion order for equal priorities. For every dispatch a
//! [`MiddlewareDispatcher`] snapshots the enabled entries into a flat slice;
//! [`Next`] is a cursor into that slice, so continuing the chain is just
//! advancing the cursor and short-circuiting is returning without calling it.
use std::{cmp::Reverse, collections::HashMap, fmt, sync::Arc};

use sha1::{Digest, Sha1};

use crate::core::{
    error::{DispatchResult, RoutingError, RoutingResult},
    request::RouteRequest,
};

/// A unit of cross-cutting behavior wrapped around the terminal handler.
pub trait Middleware: Send + Sync {
    /// Inspect or modify `request`, then either call `next.run(request)` or
    /// return a response directly to short-circuit the rest of the chain.
    fn handle(&self, request: RouteRequest, next: Next<'_>) -> DispatchResult;
}

/// The innermost step of a chain.
pub trait RequestHandler {
    fn handle(&self, request: RouteRequest) -> DispatchResult;
}

impl<F> RequestHandler for F
where
    F: Fn(RouteRequest) -> DispatchResult,
{
    fn handle(&self, request: RouteRequest) -> DispatchResult {
        self(request)
    }
}

/// Remaining part of the chain handed to a middleware.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    terminal: &'a dyn RequestHandler,
}

impl<'a> Next<'a> {
    pub fn new(chain: &'a [Arc<dyn Middleware>], terminal: &'a dyn RequestHandler) -> Self {
        Self { chain, terminal }
    }

    /// Continue with the next middleware, or the terminal handler when the
    /// chain is exhausted.
    pub fn run(self, request: RouteRequest) -> DispatchResult {
        match self.chain.split_first() {
            Some((head, rest)) => head.handle(
                request,
                Next {
                    chain: rest,
                    terminal: self.terminal,
                },
            ),
            None => self.terminal.handle(request),
        }
    }

    /// Number of middleware still ahead in the chain.
    pub fn remaining(&self) -> usize {
        self.chain.len()
    }
}

/// Middleware built from a closure, see [`from_fn`].
pub struct FromFn<F> {
    f: F,
}

/// Wrap a closure `(request, next) -> result` as a [`Middleware`].
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: Fn(RouteRequest, Next<'_>) -> DispatchResult + Send + Sync,
{
    FromFn { f }
}

impl<F> Middleware for FromFn<F>
where
    F: Fn(RouteRequest, Next<'_>) -> DispatchResult + Send + Sync,
{
    fn handle(&self, request: RouteRequest, next: Next<'_>) -> DispatchResult {
        (self.f)(request, next)
    }
}

/// A registered middleware: its name, priority, toggle and behavior.
#[derive(Clone)]
pub struct MiddlewareRef {
    name: String,
    priority: i32,
    enabled: bool,
    behavior: Arc<dyn Middleware>,
}

impl MiddlewareRef {
    pub fn new(name: impl Into<String>, behavior: impl Middleware + 'static) -> Self {
        Self::from_arc(name, Arc::new(behavior))
    }

    pub fn from_arc(name: impl Into<String>, behavior: Arc<dyn Middleware>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            enabled: true,
            behavior,
        }
    }

    /// Name derived from the middleware type alone. Instances of one type
    /// share the name whatever their configuration, so a manager keeps at
    /// most one of them; use [`MiddlewareRef::new`] to register several.
    pub fn per_type<M: Middleware + 'static>(behavior: M) -> Self {
        let digest = Sha1::digest(std::any::type_name::<M>().as_bytes());
        let name = format!("mw-{:x}", digest);
        Self::new(&name[..11], behavior)
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn behavior(&self) -> &Arc<dyn Middleware> {
        &self.behavior
    }
}

impl fmt::Debug for MiddlewareRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareRef")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Priority-ordered middleware list.
#[derive(Debug, Clone, Default)]
pub struct MiddlewareManager {
    entries: Vec<MiddlewareRef>,
}

impl MiddlewareManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert after every entry of greater or equal priority. An entry with
    /// the same name is replaced.
    pub fn add(&mut self, middleware: MiddlewareRef) -> &mut Self {
        if self.remove(middleware.name()).is_some() {
            tracing::debug!("Replacing middleware '{}'", middleware.name());
        }
        let position = self
            .entries
            .iter()
            .position(|m| m.priority < middleware.priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(position, middleware);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<MiddlewareRef> {
        let index = self.entries.iter().position(|m| m.name == name)?;
        Some(self.entries.remove(index))
    }

    /// Toggle a middleware by name. Returns `false` when it is not registered.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.entries.iter_mut().find(|m| m.name == name) {
            Some(entry) => {
                entry.set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&MiddlewareRef> {
        self.entries.iter().find(|m| m.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MiddlewareRef> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries of this manager followed by `extra`, stably re-sorted by
    /// descending priority. On ties this manager's entries come first.
    /// Names stay unique: a later entry (route middleware) replaces an earlier
    /// one of the same name.
    pub fn merged(&self, extra: &[MiddlewareRef]) -> Vec<MiddlewareRef> {
        let combined: Vec<&MiddlewareRef> = self.entries.iter().chain(extra).collect();
        let mut all: Vec<MiddlewareRef> = combined
            .iter()
            .enumerate()
            .filter(|(i, m)| !combined[i + 1..].iter().any(|later| later.name == m.name))
            .map(|(_, m)| MiddlewareRef::clone(m))
            .collect();
        all.sort_by_key(|m| Reverse(m.priority));
        all
    }

    pub fn dispatcher(&self) -> MiddlewareDispatcher {
        MiddlewareDispatcher::new(self.entries.iter().cloned())
    }

    /// Run `request` through every enabled middleware and then `final_handler`.
    pub fn process(&self, request: RouteRequest, final_handler: &dyn RequestHandler) -> DispatchResult {
        self.dispatcher().process(request, final_handler)
    }
}

/// Flattened, enabled-only chain built once per dispatch.
#[derive(Clone, Default)]
pub struct MiddlewareDispatcher {
    chain: Vec<Arc<dyn Middleware>>,
    names: Vec<String>,
}

impl MiddlewareDispatcher {
    /// Disabled entries are dropped here. Entries are stably sorted by
    /// descending priority.
    pub fn new(entries: impl IntoIterator<Item = MiddlewareRef>) -> Self {
        let mut enabled: Vec<MiddlewareRef> = entries.into_iter().filter(|m| m.enabled).collect();
        enabled.sort_by_key(|m| Reverse(m.priority));

        let names = enabled.iter().map(|m| m.name.clone()).collect();
        let chain = enabled.into_iter().map(|m| m.behavior).collect();
        Self { chain, names }
    }

    /// Names of the middleware that will run, outermost first.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn process(&self, request: RouteRequest, final_handler: &dyn RequestHandler) -> DispatchResult {
        Next::new(&self.chain, final_handler).run(request)
    }
}

impl fmt::Debug for MiddlewareDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareDispatcher")
            .field("chain", &self.names)
            .finish()
    }
}

/// Name-addressable middleware, used to resolve the `middleware: [..]`
/// references in route definition files and cache snapshots.
#[derive(Debug, Clone, Default)]
pub struct MiddlewareRegistry {
    entries: HashMap<String, MiddlewareRef>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, middleware: MiddlewareRef) -> &mut Self {
        self.entries.insert(middleware.name().to_string(), middleware);
        self
    }

    pub fn resolve(&self, name: &str) -> RoutingResult<MiddlewareRef> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| RoutingError::UnknownMiddleware {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
