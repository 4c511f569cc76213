//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! service. All types derive Serde traits for deserialization from config
//! files.

use serde::{Deserialize, Serialize};

/// Root configuration for the favicon service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address, connection ceiling).
    pub listener: ListenerConfig,

    /// On-disk cache settings.
    pub cache: CacheConfig,

    /// Response caching headers (browser/CDN max-age, ETag).
    pub response: ResponseConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// On-disk cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root directory; `orig/`, `resized/` and `fallback/` live under it.
    pub root: String,

    /// Entry time-to-live in seconds, measured from file modtime.
    pub ttl_secs: u64,

    /// Janitor sweep interval in seconds. 0 disables the janitor.
    pub janitor_interval_secs: u64,

    /// Total size bound in bytes enforced by the janitor. 0 means unbounded.
    pub max_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: "./favicon-cache".to_string(),
            ttl_secs: 7 * 24 * 3600,
            janitor_interval_secs: 3600,
            max_bytes: 0,
        }
    }
}

/// Response caching headers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// `max-age` for browsers, seconds. 0 falls back to one day.
    pub browser_max_age_secs: u64,

    /// `s-maxage` for CDNs, seconds. 0 falls back to the browser value.
    pub cdn_s_maxage_secs: u64,

    /// Emit ETags and honor `If-None-Match`.
    pub use_etag: bool,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            browser_max_age_secs: 86400,
            cdn_s_maxage_secs: 86400,
            use_etag: true,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Maximum requests per second per client IP. 0 disables the per-IP bucket.
    pub requests_per_second: u32,

    /// Per-IP burst capacity. 0 defaults to twice the rate.
    pub burst_size: u32,

    /// Service-wide requests per second across all clients. 0 disables.
    pub global_requests_per_second: u32,

    /// Service-wide burst capacity. 0 defaults to twice the rate.
    pub global_burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: 20,
            burst_size: 40,
            global_requests_per_second: 0,
            global_burst_size: 0,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
