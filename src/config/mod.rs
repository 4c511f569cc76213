//! Service configuration.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CacheConfig, ListenerConfig, ObservabilityConfig, RateLimitConfig, ResponseConfig,
    ServiceConfig,
};
pub use validation::{validate_config, ValidationError};
