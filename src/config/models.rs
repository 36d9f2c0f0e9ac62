//! Configuration data structures.
//!
//! `RouterConfig` is the top-level settings file consumed by the CLI and by
//! hosts embedding the router. `RouteFile` / `RouteRecord` describe one route
//! definition source; `RouteDefinition` is the validated-on-load form shared
//! by file sources and routes declared in code.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{
    error::{RoutingError, RoutingResult},
    handler::{ClosureHandler, HandlerDescriptor},
    middleware::MiddlewareRegistry,
    route::{Route, normalize_method},
};

fn default_inject_route_attributes() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cache_path() -> String {
    "var/cache/routes.json".to_string()
}

/// Where route snapshots are persisted between runs.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    #[default]
    None,
    Memory,
    File,
}

/// Route cache settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Cache file, used by the `file` backend
    pub path: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::None,
            path: default_cache_path(),
        }
    }
}

/// Log output format
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    Pretty,
    #[default]
    Compact,
}

/// One route definition file and the group label its routes are tagged with.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RouteSourceConfig {
    pub path: String,
    /// Overrides the `group` declared inside the file
    #[serde(default)]
    pub group: Option<String>,
}

/// Top-level router configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    /// Route sources, loaded in order
    #[serde(default)]
    pub sources: Vec<RouteSourceConfig>,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Names of registry middleware applied to every route
    #[serde(default)]
    pub middleware: Vec<String>,
    /// Expose route parameters and metadata as request attributes
    #[serde(default = "default_inject_route_attributes")]
    pub inject_route_attributes: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl RouterConfig {
    pub fn builder() -> RouterConfigBuilder {
        RouterConfigBuilder::default()
    }

    /// Resolve relative source and cache paths against `base`, usually the
    /// directory holding the configuration file.
    pub fn rebase(&mut self, base: &Path) {
        let rebase_one = |path: &mut String| {
            if !path.is_empty() && Path::new(path.as_str()).is_relative() {
                *path = base.join(path.as_str()).to_string_lossy().into_owned();
            }
        };
        for source in &mut self.sources {
            rebase_one(&mut source.path);
        }
        rebase_one(&mut self.cache.path);
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            cache: CacheConfig::default(),
            middleware: Vec::new(),
            inject_route_attributes: true,
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

/// Builder for RouterConfig to allow for cleaner configuration creation
#[derive(Default)]
pub struct RouterConfigBuilder {
    config: RouterConfig,
}

impl RouterConfigBuilder {
    /// Add a route source file with an optional group label
    pub fn source(mut self, path: impl Into<String>, group: Option<&str>) -> Self {
        self.config.sources.push(RouteSourceConfig {
            path: path.into(),
            group: group.map(str::to_string),
        });
        self
    }

    /// Keep snapshots in process memory
    pub fn memory_cache(mut self) -> Self {
        self.config.cache.backend = CacheBackend::Memory;
        self
    }

    /// Persist snapshots to `path`
    pub fn file_cache(mut self, path: impl Into<String>) -> Self {
        self.config.cache = CacheConfig {
            backend: CacheBackend::File,
            path: path.into(),
        };
        self
    }

    /// Apply a registry middleware to every route
    pub fn middleware(mut self, name: impl Into<String>) -> Self {
        self.config.middleware.push(name.into());
        self
    }

    pub fn inject_route_attributes(mut self, enabled: bool) -> Self {
        self.config.inject_route_attributes = enabled;
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log_level = level.into();
        self
    }

    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.config.log_format = format;
        self
    }

    pub fn build(self) -> RouterConfig {
        self.config
    }
}

/// A single verb or a list of verbs.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum MethodList {
    One(String),
    Many(Vec<String>),
}

impl MethodList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            MethodList::One(method) => vec![method],
            MethodList::Many(methods) => methods,
        }
    }
}

/// Handler as written in a route file: `"Class@method"` or `[class, method]`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum RawHandler {
    Named(String),
    Pair(Vec<String>),
}

/// One entry of a route definition file
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RouteRecord {
    #[serde(alias = "method")]
    pub methods: MethodList,
    pub path: String,
    pub handler: RawHandler,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub middleware: Vec<String>,
    #[serde(default)]
    pub priority: i32,
}

/// Contents of a route definition file
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct RouteFile {
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub routes: Vec<RouteRecord>,
}

/// Handler of a route definition, before validation.
#[derive(Debug, Clone)]
pub enum HandlerSpec {
    Named(String),
    Pair(Vec<String>),
    Closure(ClosureHandler),
}

impl HandlerSpec {
    /// The descriptor, when the handler is well formed.
    pub fn to_descriptor(&self) -> Option<HandlerDescriptor> {
        match self {
            HandlerSpec::Named(spec) => HandlerDescriptor::parse_named(spec),
            HandlerSpec::Pair(pair) => match pair.as_slice() {
                [target, method] if !target.trim().is_empty() && !method.trim().is_empty() => {
                    Some(HandlerDescriptor::callable(target.trim(), method.trim()))
                }
                _ => None,
            },
            HandlerSpec::Closure(closure) => Some(HandlerDescriptor::Closure(closure.clone())),
        }
    }
}

impl From<RawHandler> for HandlerSpec {
    fn from(raw: RawHandler) -> Self {
        match raw {
            RawHandler::Named(spec) => HandlerSpec::Named(spec),
            RawHandler::Pair(pair) => HandlerSpec::Pair(pair),
        }
    }
}

/// A raw route definition from any source.
#[derive(Debug, Clone)]
pub struct RouteDefinition {
    pub methods: Vec<String>,
    pub path: String,
    pub handler: HandlerSpec,
    pub name: Option<String>,
    pub middleware: Vec<String>,
    pub priority: i32,
}

impl RouteDefinition {
    pub fn new<M, S>(methods: M, path: impl Into<String>, handler: HandlerSpec) -> Self
    where
        M: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            methods: methods.into_iter().map(Into::into).collect(),
            path: path.into(),
            handler,
            name: None,
            middleware: Vec::new(),
            priority: 0,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn middleware(mut self, name: impl Into<String>) -> Self {
        self.middleware.push(name.into());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Short label used in error messages, e.g. `GET|POST /posts`.
    pub fn label(&self) -> String {
        format!("{} {}", self.methods.join("|"), self.path)
    }

    /// Build the route, tagging it with `group` and resolving middleware
    /// names through `registry`. Run the validator first for a complete
    /// violation list; this only reports the first problem it meets.
    pub fn into_route(self, group: Option<&str>, registry: &MiddlewareRegistry) -> RoutingResult<Route> {
        let config_err = |violation: String| RoutingError::RouteConfiguration {
            route: self.label(),
            violations: vec![violation],
        };

        let methods = self
            .methods
            .iter()
            .map(|m| normalize_method(m).ok_or_else(|| config_err(format!("unsupported HTTP method '{m}'"))))
            .collect::<RoutingResult<Vec<_>>>()?;
        let handler = self
            .handler
            .to_descriptor()
            .ok_or_else(|| config_err("handler must be \"Class@method\", [class, method] or a closure".to_string()))?;
        let middleware = self
            .middleware
            .iter()
            .map(|name| registry.resolve(name))
            .collect::<RoutingResult<Vec<_>>>()?;

        let mut route = Route::new(methods, &self.path, handler)?
            .with_middlewares(middleware)
            .with_priority(self.priority);
        if let Some(name) = &self.name {
            route = route.with_name(name.trim());
        }
        if let Some(group) = group {
            route = route.with_group(group);
        }
        Ok(route)
    }
}

impl From<RouteRecord> for RouteDefinition {
    fn from(record: RouteRecord) -> Self {
        Self {
            methods: record.methods.into_vec(),
            path: record.path,
            handler: record.handler.into(),
            name: record.name,
            middleware: record.middleware,
            priority: record.priority,
        }
    }
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::*;

    #[test]
    fn test_router_config_defaults() {
        let config: RouterConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RouterConfig::default());
        assert!(config.inject_route_attributes);
        assert_eq!(config.cache.backend, CacheBackend::None);
        assert_eq!(config.log_format, LogFormat::Compact);
    }

    #[test]
    fn test_builder() {
        let config = RouterConfig::builder()
            .source("routes/web.yaml", Some("web"))
            .source("routes/api.toml", None)
            .file_cache("/tmp/routes.json")
            .middleware("timing")
            .log_format(LogFormat::Json)
            .build();
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].group.as_deref(), Some("web"));
        assert_eq!(config.cache.backend, CacheBackend::File);
        assert_eq!(config.middleware, ["timing"]);
    }

    #[test]
    fn test_rebase() {
        let mut config = RouterConfig::builder()
            .source("routes/web.yaml", None)
            .source("/etc/junction/api.yaml", None)
            .build();
        config.rebase(Path::new("/srv/app"));
        assert_eq!(config.sources[0].path, "/srv/app/routes/web.yaml");
        assert_eq!(config.sources[1].path, "/etc/junction/api.yaml");
        assert_eq!(config.cache.path, "/srv/app/var/cache/routes.json");
    }

    #[test]
    fn test_route_record_shapes() {
        let file: RouteFile = serde_json::from_value(serde_json::json!({
            "group": "web",
            "routes": [
                { "method": "GET", "path": "/posts", "handler": "PostController@index" },
                { "methods": ["PUT", "PATCH"], "path": "/posts/{id}",
                  "handler": ["PostController", "update"], "name": "posts.update",
                  "middleware": ["auth"], "priority": 2 }
            ]
        }))
        .unwrap();

        assert_eq!(file.routes[0].methods, MethodList::One("GET".to_string()));
        assert_eq!(
            file.routes[1].handler,
            RawHandler::Pair(vec!["PostController".to_string(), "update".to_string()])
        );

        let definition = RouteDefinition::from(file.routes[1].clone());
        assert_eq!(definition.methods, ["PUT", "PATCH"]);
        assert_eq!(definition.priority, 2);
    }

    #[test]
    fn test_into_route() {
        let route = RouteDefinition::new(["get", "head"], "/posts/{id}", HandlerSpec::Named("PostController@show".into()))
            .name("posts.show")
            .priority(3)
            .into_route(Some("web"), &MiddlewareRegistry::new())
            .unwrap();
        assert_eq!(route.methods(), [Method::GET, Method::HEAD]);
        assert_eq!(route.group(), Some("web"));
        assert_eq!(route.name(), Some("posts.show"));
        assert_eq!(route.priority(), 3);
    }

    #[test]
    fn test_into_route_unknown_middleware() {
        let err = RouteDefinition::new(["GET"], "/", HandlerSpec::Named("Home@index".into()))
            .middleware("auth")
            .into_route(None, &MiddlewareRegistry::new())
            .unwrap_err();
        assert!(matches!(err, RoutingError::UnknownMiddleware { .. }));
    }
}
