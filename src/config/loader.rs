use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use config::{Config, File, FileFormat};
use eyre::{Context, Result};
use serde::Serialize;
use sha1::{Digest, Sha1};
use tracing::Instrument;

use crate::{
    adapters::{file_cache::FileRouteCache, memory_cache::MemoryRouteCache},
    config::{
        models::{CacheBackend, RouteDefinition, RouteFile, RouterConfig},
        validation::RouteValidator,
    },
    core::{collection::RouteCollection, middleware::MiddlewareRegistry, router::Router},
    metrics,
    ports::{
        route_cache::{CacheSnapshot, RouteCache},
        service_resolver::ServiceResolver,
    },
    tracing_setup,
};

/// Group label used in statistics for routes loaded without one.
pub const DEFAULT_GROUP: &str = "default";

fn file_format(path: &Path) -> FileFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => FileFormat::Json,
        Some("toml") => FileFormat::Toml,
        _ => FileFormat::Yaml,
    }
}

fn read_with_config_crate<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let settings = Config::builder()
        .add_source(File::new(
            path.to_str()
                .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", path.display()))?,
            file_format(path),
        ))
        .build()
        .with_context(|| format!("Failed to read {}", path.display()))?;

    settings
        .try_deserialize()
        .with_context(|| format!("Failed to deserialize {}", path.display()))
}

/// Load router configuration from a YAML, JSON or TOML file (by extension).
pub async fn load_config(config_path: &str) -> Result<RouterConfig> {
    load_config_sync(config_path)
}

/// Load router configuration synchronously. Relative paths inside the file
/// are resolved against the file's directory.
pub fn load_config_sync(config_path: &str) -> Result<RouterConfig> {
    let path = Path::new(config_path);
    let mut config: RouterConfig = read_with_config_crate(path)?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        config.rebase(dir);
    }
    Ok(config)
}

/// Parse one route definition file.
pub fn load_route_file(path: impl AsRef<Path>) -> Result<RouteFile> {
    read_with_config_crate(path.as_ref())
}

/// Where route definitions come from.
#[derive(Debug, Clone)]
pub enum RouteSource {
    /// A definition file; `group` overrides the group declared in the file
    File { path: PathBuf, group: Option<String> },
    /// Definitions built in code
    Inline {
        group: Option<String>,
        definitions: Vec<RouteDefinition>,
    },
}

/// Outcome of a load
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub total_routes: usize,
    pub files_loaded: usize,
    pub per_group: BTreeMap<String, usize>,
    /// Sources were skipped because a current snapshot was found
    pub from_cache: bool,
}

impl LoadStats {
    fn count(&mut self, collection: &RouteCollection) {
        self.total_routes = collection.len();
        for route in collection.all() {
            let group = route.group().unwrap_or(DEFAULT_GROUP).to_string();
            *self.per_group.entry(group).or_default() += 1;
        }
    }
}

/// Reads route sources in order, validates every definition and registers the
/// resulting routes, going through the route cache when one is configured.
pub struct RouteLoader {
    sources: Vec<RouteSource>,
    registry: MiddlewareRegistry,
    cache: Option<Arc<dyn RouteCache>>,
}

impl RouteLoader {
    pub fn new(registry: MiddlewareRegistry) -> Self {
        Self {
            sources: Vec::new(),
            registry,
            cache: None,
        }
    }

    /// Loader for every source of `config`, with the configured cache backend.
    pub fn from_config(config: &RouterConfig, registry: MiddlewareRegistry) -> Self {
        let mut loader = Self::new(registry);
        for source in &config.sources {
            loader = loader.file(&source.path, source.group.as_deref());
        }
        match config.cache.backend {
            CacheBackend::None => loader,
            CacheBackend::Memory => loader.with_cache(Arc::new(MemoryRouteCache::new())),
            CacheBackend::File => loader.with_cache(Arc::new(FileRouteCache::new(&config.cache.path))),
        }
    }

    pub fn source(mut self, source: RouteSource) -> Self {
        self.sources.push(source);
        self
    }

    pub fn file(self, path: impl Into<PathBuf>, group: Option<&str>) -> Self {
        self.source(RouteSource::File {
            path: path.into(),
            group: group.map(str::to_string),
        })
    }

    pub fn inline(self, group: Option<&str>, definitions: Vec<RouteDefinition>) -> Self {
        self.source(RouteSource::Inline {
            group: group.map(str::to_string),
            definitions,
        })
    }

    pub fn with_cache(mut self, cache: Arc<dyn RouteCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn sources(&self) -> &[RouteSource] {
        &self.sources
    }

    pub fn cache(&self) -> Option<&Arc<dyn RouteCache>> {
        self.cache.as_ref()
    }

    /// SHA-1 over every source: file paths and contents, inline definitions.
    /// A snapshot is only reused while this stays the same.
    pub async fn fingerprint(&self) -> Result<String> {
        let mut hasher = Sha1::new();
        for source in &self.sources {
            match source {
                RouteSource::File { path, group } => {
                    let content = tokio::fs::read(path)
                        .await
                        .with_context(|| format!("Failed to read route source {}", path.display()))?;
                    hasher.update(b"file\0");
                    hasher.update(path.to_string_lossy().as_bytes());
                    hasher.update(format!("\0{group:?}\0").as_bytes());
                    hasher.update(&content);
                }
                RouteSource::Inline { group, definitions } => {
                    hasher.update(format!("inline\0{group:?}\0").as_bytes());
                    for def in definitions {
                        hasher.update(
                            format!(
                                "{}\0{:?}\0{:?}\0{:?}\0{}\n",
                                def.label(),
                                def.handler,
                                def.name,
                                def.middleware,
                                def.priority
                            )
                            .as_bytes(),
                        );
                    }
                }
            }
        }
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Load every source into `router`.
    ///
    /// With a cache, a current snapshot replaces reading the sources. After a
    /// miss the freshly built routes are stored; routes with closure handlers
    /// make that fail with `CacheError::UncacheableRoutes` before anything is
    /// registered.
    pub async fn load_into(&self, router: &mut Router) -> Result<LoadStats> {
        let span = tracing_setup::configure_component_tracing("route_loader");
        self.load_routes(router).instrument(span).await
    }

    async fn load_routes(&self, router: &mut Router) -> Result<LoadStats> {
        let fingerprint = match &self.cache {
            Some(_) => Some(self.fingerprint().await?),
            None => None,
        };

        if let (Some(cache), Some(fingerprint)) = (&self.cache, &fingerprint) {
            if let Some(collection) = self.restore_from(cache.as_ref(), fingerprint).await {
                router
                    .extend(&collection)
                    .wrap_err("Failed to register cached routes")?;
                let mut stats = LoadStats {
                    from_cache: true,
                    ..LoadStats::default()
                };
                stats.count(&collection);
                tracing::info!(routes = stats.total_routes, "Routes restored from cache");
                return Ok(stats);
            }
        }

        let (collection, files_loaded) = self.build_collection().await?;

        if let (Some(cache), Some(fingerprint)) = (&self.cache, fingerprint) {
            let snapshot = CacheSnapshot::capture(&collection, fingerprint)
                .wrap_err("Loaded routes cannot be cached")?;
            match cache.store(snapshot).await {
                Ok(()) => metrics::record_cache("store"),
                Err(e) => {
                    metrics::record_cache("error");
                    tracing::warn!("Failed to store route cache: {}", e);
                }
            }
        }

        router
            .extend(&collection)
            .wrap_err("Failed to register loaded routes")?;

        let mut stats = LoadStats {
            files_loaded,
            ..LoadStats::default()
        };
        stats.count(&collection);
        tracing::info!(
            routes = stats.total_routes,
            files = stats.files_loaded,
            "Routes loaded"
        );
        Ok(stats)
    }

    async fn restore_from(&self, cache: &dyn RouteCache, fingerprint: &str) -> Option<RouteCollection> {
        match cache.load(fingerprint).await {
            Ok(Some(snapshot)) => match snapshot.restore(&self.registry) {
                Ok(collection) => {
                    metrics::record_cache("hit");
                    Some(collection)
                }
                Err(e) => {
                    metrics::record_cache("error");
                    tracing::warn!("Discarding unusable route cache: {}", e);
                    None
                }
            },
            Ok(None) => {
                metrics::record_cache("miss");
                tracing::debug!("Route cache miss");
                None
            }
            Err(e) => {
                metrics::record_cache("error");
                tracing::warn!("Route cache lookup failed: {}", e);
                None
            }
        }
    }

    async fn build_collection(&self) -> Result<(RouteCollection, usize)> {
        let mut collection = RouteCollection::new();
        let mut files_loaded = 0;

        for source in &self.sources {
            let (origin, group, definitions) = match source {
                RouteSource::File { path, group } => {
                    let file = load_route_file(path)?;
                    files_loaded += 1;
                    let group = group.clone().or(file.group);
                    let definitions: Vec<RouteDefinition> =
                        file.routes.into_iter().map(RouteDefinition::from).collect();
                    (path.display().to_string(), group, definitions)
                }
                RouteSource::Inline { group, definitions } => {
                    ("inline routes".to_string(), group.clone(), definitions.clone())
                }
            };
            tracing::debug!(source = %origin, routes = definitions.len(), "Loading route source");

            for definition in definitions {
                RouteValidator::validate_route(&definition)
                    .wrap_err_with(|| format!("Invalid route in {origin}"))?;
                let route = definition
                    .into_route(group.as_deref(), &self.registry)
                    .wrap_err_with(|| format!("Invalid route in {origin}"))?;
                collection
                    .add(route)
                    .wrap_err_with(|| format!("Cannot register route from {origin}"))?;
            }
        }

        Ok((collection, files_loaded))
    }
}

/// Build a router from `config`: global middleware, attribute injection and
/// every configured route source.
pub async fn build_router(
    config: &RouterConfig,
    services: Arc<dyn ServiceResolver>,
    registry: MiddlewareRegistry,
) -> Result<(Router, LoadStats)> {
    let mut router = Router::new(services);
    router.set_inject_route_attributes(config.inject_route_attributes);
    for name in &config.middleware {
        let middleware = registry
            .resolve(name)
            .wrap_err("Unknown global middleware in configuration")?;
        router.middleware(middleware);
    }

    let stats = RouteLoader::from_config(config, registry)
        .load_into(&mut router)
        .await?;
    Ok((router, stats))
}

/// Remove the configured route snapshot, if any.
pub async fn clear_cache(config: &RouterConfig) -> Result<bool> {
    if config.cache.backend != CacheBackend::File {
        return Ok(false);
    }
    FileRouteCache::new(&config.cache.path)
        .clear()
        .await
        .wrap_err("Failed to clear route cache")?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::{
        adapters::container::ServiceContainer,
        config::models::{HandlerSpec, LogFormat},
        core::error::RoutingError,
    };

    fn router() -> Router {
        Router::new(Arc::new(ServiceContainer::new()))
    }

    #[tokio::test]
    async fn test_load_yaml_config() {
        let yaml_content = r#"
sources:
  - path: "routes/web.yaml"
    group: "web"
cache:
  backend: "file"
  path: "/tmp/junction-routes.json"
middleware: ["timing"]
log_format: "json"
"#;

        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        write!(temp_file, "{}", yaml_content).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].group.as_deref(), Some("web"));
        assert_eq!(config.cache.backend, CacheBackend::File);
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.inject_route_attributes);
    }

    #[tokio::test]
    async fn test_load_json_route_file() {
        let json_content = r#"
{
  "group": "api",
  "routes": [
    { "method": "GET", "path": "/api/posts", "handler": "Api@index", "name": "api.posts" },
    { "methods": ["POST"], "path": "/api/posts", "handler": ["Api", "store"] }
  ]
}
"#;
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        write!(temp_file, "{}", json_content).unwrap();

        let file = load_route_file(temp_file.path()).unwrap();
        assert_eq!(file.group.as_deref(), Some("api"));
        assert_eq!(file.routes.len(), 2);

        let mut router = router();
        let stats = RouteLoader::new(MiddlewareRegistry::new())
            .file(temp_file.path(), None)
            .load_into(&mut router)
            .await
            .unwrap();
        assert_eq!(stats.total_routes, 2);
        assert_eq!(stats.files_loaded, 1);
        assert_eq!(stats.per_group["api"], 2);
        assert!(!stats.from_cache);
        assert_eq!(router.routes().get_by_name("api.posts").unwrap().group(), Some("api"));
    }

    #[tokio::test]
    async fn test_invalid_definition_aborts_load() {
        let mut router = router();
        let err = RouteLoader::new(MiddlewareRegistry::new())
            .inline(
                None,
                vec![
                    RouteDefinition::new(["GET"], "/ok", HandlerSpec::Named("A@b".into())),
                    RouteDefinition::new(["BREW"], "nope", HandlerSpec::Named("A@b".into())),
                ],
            )
            .load_into(&mut router)
            .await
            .unwrap_err();

        let routing = err.downcast_ref::<RoutingError>().expect("routing error");
        assert!(matches!(routing, RoutingError::RouteConfiguration { violations, .. } if violations.len() == 2));
        assert!(router.routes().is_empty());
    }

    #[tokio::test]
    async fn test_inline_groups_and_stats() {
        let mut router = router();
        let stats = RouteLoader::new(MiddlewareRegistry::new())
            .inline(
                Some("admin"),
                vec![RouteDefinition::new(["GET"], "/admin", HandlerSpec::Named("Admin@index".into()))],
            )
            .inline(
                None,
                vec![RouteDefinition::new(["GET"], "/", HandlerSpec::Named("Home@index".into()))],
            )
            .load_into(&mut router)
            .await
            .unwrap();
        assert_eq!(stats.total_routes, 2);
        assert_eq!(stats.files_loaded, 0);
        assert_eq!(stats.per_group["admin"], 1);
        assert_eq!(stats.per_group[DEFAULT_GROUP], 1);
    }

    #[tokio::test]
    async fn test_fingerprint_tracks_content() {
        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(temp_file, "routes: []").unwrap();
        let loader = RouteLoader::new(MiddlewareRegistry::new()).file(temp_file.path(), None);

        let first = loader.fingerprint().await.unwrap();
        assert_eq!(first, loader.fingerprint().await.unwrap());
        assert_eq!(first.len(), 40);

        writeln!(temp_file, "group: web").unwrap();
        assert_ne!(first, loader.fingerprint().await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_cache_without_file_backend() {
        assert!(!clear_cache(&RouterConfig::default()).await.unwrap());
    }
}
