//! Configuration validation logic.

use crate::config::schema::ServiceConfig;

/// Error type for configuration validation failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation error: {}", self.0)
    }
}

/// Validate a ServiceConfig for semantic correctness.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // 1. Listener address must parse
    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError(format!(
            "listener.bind_address '{}' is not a valid socket address",
            config.listener.bind_address
        )));
    }

    // 2. Cache settings
    if config.cache.root.trim().is_empty() {
        errors.push(ValidationError("cache.root must not be empty".to_string()));
    }
    if config.cache.ttl_secs == 0 {
        errors.push(ValidationError("cache.ttl_secs must be > 0".to_string()));
    }

    // 3. Metrics address must parse when metrics are enabled
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError(format!(
            "observability.metrics_address '{}' is not a valid socket address",
            config.observability.metrics_address
        )));
    }

    // 4. Rate limiting needs at least one active bucket when enabled
    if config.rate_limit.enabled
        && config.rate_limit.requests_per_second == 0
        && config.rate_limit.global_requests_per_second == 0
    {
        errors.push(ValidationError(
            "rate_limit enabled but both rates are 0".to_string(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
