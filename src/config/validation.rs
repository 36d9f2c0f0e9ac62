use std::{collections::HashSet, path::Path};

use crate::{
    config::models::{CacheBackend, HandlerSpec, RouteDefinition, RouterConfig},
    core::{
        error::{RoutingError, RoutingResult},
        pattern::template_violations,
        route::{KNOWN_METHODS, normalize_method},
    },
};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Router configuration problems
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Checks a raw route definition before it becomes a `Route`.
pub struct RouteValidator;

impl RouteValidator {
    /// Check every rule and report all violations at once as
    /// `RoutingError::RouteConfiguration`.
    pub fn validate_route(definition: &RouteDefinition) -> RoutingResult<()> {
        let violations = Self::violations(definition);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(RoutingError::RouteConfiguration {
                route: definition.label(),
                violations,
            })
        }
    }

    /// Every rule a definition breaks, in check order.
    pub fn violations(definition: &RouteDefinition) -> Vec<String> {
        let mut violations = Vec::new();

        if definition.methods.is_empty() {
            violations.push("at least one HTTP method is required".to_string());
        }
        for method in &definition.methods {
            if normalize_method(method).is_none() {
                violations.push(format!(
                    "unsupported HTTP method '{method}' (expected one of {})",
                    KNOWN_METHODS.join(", ")
                ));
            }
        }

        violations.extend(template_violations(&definition.path));

        match &definition.handler {
            HandlerSpec::Named(spec) if definition.handler.to_descriptor().is_none() => {
                violations.push(format!("handler '{spec}' must have the form \"Class@method\""));
            }
            HandlerSpec::Pair(pair) if definition.handler.to_descriptor().is_none() => {
                violations.push(format!(
                    "handler pair must be [class, method], got {} element(s)",
                    pair.len()
                ));
            }
            _ => {}
        }

        if let Some(name) = &definition.name {
            if name.trim().is_empty() {
                violations.push("route name must not be empty".to_string());
            }
        }

        if definition.middleware.iter().any(|m| m.trim().is_empty()) {
            violations.push("middleware names must not be empty".to_string());
        }

        violations
    }
}

/// Router configuration validator
pub struct RouterConfigValidator;

impl RouterConfigValidator {
    /// Validate the entire router configuration
    pub fn validate(config: &RouterConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        let mut seen = HashSet::new();
        for (index, source) in config.sources.iter().enumerate() {
            let field = format!("sources[{index}].path");
            if source.path.trim().is_empty() {
                errors.push(ValidationError::MissingField { field });
                continue;
            }
            if let Err(e) = Self::validate_source_extension(&source.path, &field) {
                errors.push(e);
            }
            if !seen.insert(source.path.as_str()) {
                errors.push(ValidationError::InvalidField {
                    field,
                    message: format!("'{}' is listed more than once", source.path),
                });
            }
            if source.group.as_deref().is_some_and(|g| g.trim().is_empty()) {
                errors.push(ValidationError::InvalidField {
                    field: format!("sources[{index}].group"),
                    message: "group label must not be empty".to_string(),
                });
            }
        }

        if config.cache.backend == CacheBackend::File && config.cache.path.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "cache.path".to_string(),
            });
        }

        for (index, name) in config.middleware.iter().enumerate() {
            if name.trim().is_empty() {
                errors.push(ValidationError::InvalidField {
                    field: format!("middleware[{index}]"),
                    message: "middleware names must not be empty".to_string(),
                });
            }
        }

        if config.log_level.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "log_level".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    fn validate_source_extension(path: &str, field: &str) -> ValidationResult<()> {
        match Path::new(path).extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml" | "json" | "toml") => Ok(()),
            _ => Err(ValidationError::InvalidField {
                field: field.to_string(),
                message: format!("'{path}' must have a .yaml, .yml, .json or .toml extension"),
            }),
        }
    }

    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        if errors.len() == 1 {
            return errors[0].to_string();
        }
        let mut message = format!("{} configuration errors:", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("\n  {}. {}", i + 1, error));
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::models::{RouteSourceConfig, RouterConfig},
        core::handler::ClosureHandler,
    };

    fn named(methods: &[&str], path: &str, handler: &str) -> RouteDefinition {
        RouteDefinition::new(methods.iter().copied(), path, HandlerSpec::Named(handler.to_string()))
    }

    #[test]
    fn test_valid_definitions() {
        assert!(RouteValidator::validate_route(&named(&["GET"], "/posts/{id}", "PostController@show")).is_ok());
        let pair = RouteDefinition::new(
            ["post"],
            "/posts",
            HandlerSpec::Pair(vec!["PostController".into(), "store".into()]),
        );
        assert!(RouteValidator::validate_route(&pair).is_ok());
        let closure = RouteDefinition::new(
            ["GET"],
            "/",
            HandlerSpec::Closure(ClosureHandler::new(|_req, resp, _params| Ok(resp))),
        );
        assert!(RouteValidator::validate_route(&closure).is_ok());
    }

    #[test]
    fn test_all_violations_are_reported() {
        let definition = named(&["FETCH"], "posts/{id", "PostController")
            .name(" ")
            .middleware("");
        let err = RouteValidator::validate_route(&definition).unwrap_err();
        match err {
            RoutingError::RouteConfiguration { route, violations } => {
                assert_eq!(route, "FETCH posts/{id");
                assert_eq!(violations.len(), 5, "{violations:?}");
                assert!(violations[0].contains("FETCH"));
                assert!(violations[1].contains("must start with '/'"));
                assert!(violations[2].contains("Class@method"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_methods_and_bad_pair() {
        let definition = RouteDefinition::new(
            Vec::<String>::new(),
            "/x",
            HandlerSpec::Pair(vec!["Only".into()]),
        );
        let violations = RouteValidator::violations(&definition);
        assert_eq!(violations.len(), 2);
        assert!(violations[1].contains("1 element"));
    }

    #[test]
    fn test_router_config_validation() {
        assert!(RouterConfigValidator::validate(&RouterConfig::default()).is_ok());

        let mut config = RouterConfig::builder()
            .source("routes/web.yaml", Some("web"))
            .source("routes/web.yaml", Some(""))
            .source("routes/api.ini", None)
            .file_cache("")
            .build();
        config.sources.push(RouteSourceConfig {
            path: " ".to_string(),
            group: None,
        });

        let err = RouterConfigValidator::validate(&config).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("5 configuration errors"), "{message}");
        assert!(message.contains("more than once"));
        assert!(message.contains("cache.path"));
    }
}
