pub mod route_cache;
pub mod service_resolver;
