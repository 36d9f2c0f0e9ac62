use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{
    collection::RouteCollection,
    handler::HandlerDescriptor,
    middleware::MiddlewareRegistry,
    pattern::CompiledPattern,
    route::{Route, normalize_method},
};

/// Bumped whenever the snapshot layout changes; older files become misses.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Error type for route cache operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Closure handlers exist only in memory and cannot be persisted
    #[error("Routes with closure handlers cannot be cached: {}", .routes.join(", "))]
    UncacheableRoutes { routes: Vec<String> },

    /// A snapshot entry could not be turned back into a route
    #[error("Cannot restore cached route {route}: {reason}")]
    Restore { route: String, reason: String },
}

/// Result type for route cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Persistable handler shapes. There is deliberately no closure variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CachedHandler {
    NamedMethod { class: String, method: String },
    ArrayCallable { target: String, method: String },
}

impl CachedHandler {
    fn from_descriptor(handler: &HandlerDescriptor) -> Option<Self> {
        match handler {
            HandlerDescriptor::NamedMethod { class, method } => Some(CachedHandler::NamedMethod {
                class: class.clone(),
                method: method.clone(),
            }),
            HandlerDescriptor::ArrayCallable { target, method } => Some(CachedHandler::ArrayCallable {
                target: target.clone(),
                method: method.clone(),
            }),
            HandlerDescriptor::Closure(_) => None,
        }
    }

    fn into_descriptor(self) -> HandlerDescriptor {
        match self {
            CachedHandler::NamedMethod { class, method } => HandlerDescriptor::named(class, method),
            CachedHandler::ArrayCallable { target, method } => HandlerDescriptor::callable(target, method),
        }
    }
}

/// One route with its compiled matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedRoute {
    pub methods: Vec<String>,
    pub path: String,
    pub regex: String,
    pub params: Vec<String>,
    pub handler: CachedHandler,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub middleware: Vec<String>,
}

/// Serialized form of a whole route collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub version: u32,
    pub freshness: String,
    pub created_at: DateTime<Utc>,
    pub routes: Vec<CachedRoute>,
}

impl CacheSnapshot {
    /// Capture `routes` in registration order. Fails without producing
    /// anything when any route has a closure handler.
    pub fn capture(routes: &RouteCollection, freshness: impl Into<String>) -> CacheResult<Self> {
        let uncacheable: Vec<String> = routes
            .all()
            .iter()
            .filter(|r| !r.handler().is_cacheable())
            .map(|r| match r.name() {
                Some(name) => format!("{r} ({name})"),
                None => r.to_string(),
            })
            .collect();
        if !uncacheable.is_empty() {
            return Err(CacheError::UncacheableRoutes {
                routes: uncacheable,
            });
        }

        let cached = routes
            .all()
            .iter()
            .filter_map(|route| {
                let handler = CachedHandler::from_descriptor(route.handler())?;
                Some(CachedRoute {
                    methods: route.methods().iter().map(|m| m.to_string()).collect(),
                    path: route.path().to_string(),
                    regex: route.pattern().regex_source().to_string(),
                    params: route.pattern().param_names().to_vec(),
                    handler,
                    name: route.name().map(str::to_string),
                    group: route.group().map(str::to_string),
                    priority: route.priority(),
                    middleware: route
                        .middlewares()
                        .iter()
                        .map(|m| m.name().to_string())
                        .collect(),
                })
            })
            .collect();

        Ok(Self {
            version: SNAPSHOT_VERSION,
            freshness: freshness.into(),
            created_at: Utc::now(),
            routes: cached,
        })
    }

    /// Whether this snapshot may be used for sources fingerprinted as `freshness`.
    pub fn is_current(&self, freshness: &str) -> bool {
        self.version == SNAPSHOT_VERSION && self.freshness == freshness
    }

    /// Rebuild the collection. Middleware names are resolved through
    /// `registry`; patterns are rebuilt from the stored regex.
    pub fn restore(self, registry: &MiddlewareRegistry) -> CacheResult<RouteCollection> {
        let mut collection = RouteCollection::new();
        for entry in self.routes {
            let label = format!("{} {}", entry.methods.join("|"), entry.path);
            let restore_err = |reason: String| CacheError::Restore {
                route: label.clone(),
                reason,
            };

            let methods = entry
                .methods
                .iter()
                .map(|m| normalize_method(m).ok_or_else(|| restore_err(format!("unknown method '{m}'"))))
                .collect::<CacheResult<Vec<_>>>()?;
            let pattern = CompiledPattern::from_parts(&entry.path, &entry.regex, entry.params)
                .map_err(|e| restore_err(e.to_string()))?;
            let middleware = entry
                .middleware
                .iter()
                .map(|name| registry.resolve(name).map_err(|e| restore_err(e.to_string())))
                .collect::<CacheResult<Vec<_>>>()?;

            let mut route = Route::from_compiled(methods, pattern, entry.handler.into_descriptor())
                .map_err(|e| restore_err(e.to_string()))?
                .with_middlewares(middleware)
                .with_priority(entry.priority);
            if let Some(name) = entry.name {
                route = route.with_name(name);
            }
            if let Some(group) = entry.group {
                route = route.with_group(group);
            }
            collection.add(route).map_err(|e| restore_err(e.to_string()))?;
        }
        Ok(collection)
    }
}

/// RouteCache defines the port (interface) for persisting compiled route
/// collections between runs.
#[async_trait]
pub trait RouteCache: Send + Sync {
    /// Return the stored snapshot if it matches `freshness` and the current
    /// format version. Unreadable or stale entries are a miss (`Ok(None)`).
    async fn load(&self, freshness: &str) -> CacheResult<Option<CacheSnapshot>>;

    /// Replace the stored snapshot.
    async fn store(&self, snapshot: CacheSnapshot) -> CacheResult<()>;

    /// Remove any stored snapshot.
    async fn clear(&self) -> CacheResult<()>;
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::*;
    use crate::core::middleware::{MiddlewareRef, Next, from_fn};

    fn collection() -> RouteCollection {
        let auth = MiddlewareRef::new(
            "auth",
            from_fn(|req: crate::core::request::RouteRequest, next: Next<'_>| next.run(req)),
        );
        let mut routes = RouteCollection::new();
        routes
            .add(
                Route::get("/posts/{id}", HandlerDescriptor::named("PostController", "show"))
                    .unwrap()
                    .with_name("posts.show")
                    .with_group("web")
                    .with_middleware(auth),
            )
            .unwrap();
        routes
            .add(
                Route::new(
                    [Method::PUT, Method::PATCH],
                    "/posts/{id}",
                    HandlerDescriptor::callable("PostController", "update"),
                )
                .unwrap()
                .with_priority(4),
            )
            .unwrap();
        routes
    }

    fn registry() -> MiddlewareRegistry {
        let mut registry = MiddlewareRegistry::new();
        registry.register(MiddlewareRef::new(
            "auth",
            from_fn(|req: crate::core::request::RouteRequest, next: Next<'_>| next.run(req)),
        ));
        registry
    }

    #[test]
    fn test_capture_and_restore() {
        let snapshot = CacheSnapshot::capture(&collection(), "abc").unwrap();
        assert!(snapshot.is_current("abc"));
        assert!(!snapshot.is_current("def"));
        assert_eq!(snapshot.routes[0].params, ["id"]);

        let restored = snapshot.restore(&registry()).unwrap();
        assert_eq!(restored.len(), 2);
        let show = restored.get_by_name("posts.show").unwrap();
        assert_eq!(show.group(), Some("web"));
        assert_eq!(show.middlewares()[0].name(), "auth");
        let (route, result) = restored.find(&Method::PATCH, "/posts/9").unwrap();
        assert_eq!(route.priority(), 4);
        assert_eq!(result.params()["id"], "9");
    }

    #[test]
    fn test_closure_routes_are_rejected() {
        let mut routes = collection();
        routes
            .add(
                Route::get("/inline", HandlerDescriptor::closure(|_req, resp, _params| Ok(resp)))
                    .unwrap()
                    .with_name("inline"),
            )
            .unwrap();
        match CacheSnapshot::capture(&routes, "abc") {
            Err(CacheError::UncacheableRoutes { routes }) => {
                assert_eq!(routes, ["GET /inline (inline)"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_middleware_fails_restore() {
        let snapshot = CacheSnapshot::capture(&collection(), "abc").unwrap();
        let err = snapshot.restore(&MiddlewareRegistry::new()).unwrap_err();
        assert!(matches!(err, CacheError::Restore { .. }));
    }

    #[test]
    fn test_handler_tagging() {
        let json = serde_json::to_value(CachedHandler::NamedMethod {
            class: "PostController".to_string(),
            method: "show".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "NamedMethod");
    }
}
