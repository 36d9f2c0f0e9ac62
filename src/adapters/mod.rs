pub mod container;
pub mod file_cache;
pub mod memory_cache;
pub mod middleware;
pub mod source_watcher;

/// Re-export commonly used types from adapters
pub use container::{ActionController, ServiceContainer};
pub use file_cache::FileRouteCache;
pub use memory_cache::MemoryRouteCache;
pub use middleware::{
    CorsMiddleware, CustomHeadersMiddleware, RequestIdMiddleware, RequestTimingMiddleware,
    SecurityHeadersMiddleware, builtin_registry,
};
pub use source_watcher::RouteSourceWatcher;
