pub mod loader;
pub mod models;
pub mod validation;

pub use loader::{LoadStats, RouteLoader, RouteSource, build_router, load_config};
pub use models::*;
pub use validation::{RouteValidator, RouterConfigValidator, ValidationError, ValidationResult};
