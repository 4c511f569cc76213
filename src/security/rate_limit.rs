//! Inbound rate limiting middleware.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// A simple token bucket rate limiter.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Shared state for the per-IP + global rate limiter.
///
/// A rate of zero disables the corresponding bucket, so the default config
/// (disabled) costs nothing per request beyond the `enabled` check.
pub struct RateLimiterState {
    per_ip: DashMap<String, TokenBucket>,
    global: Option<Mutex<TokenBucket>>,
    ip_rate: f64,
    ip_burst: f64,
    global_rate: f64,
    global_burst: f64,
}

impl RateLimiterState {
    pub fn new(config: &RateLimitConfig) -> Self {
        let ip_burst = effective_burst(config.requests_per_second, config.burst_size);
        let global_burst =
            effective_burst(config.global_requests_per_second, config.global_burst_size);
        let global = (config.global_requests_per_second > 0)
            .then(|| Mutex::new(TokenBucket::new(global_burst)));
        Self {
            per_ip: DashMap::new(),
            global,
            ip_rate: config.requests_per_second as f64,
            ip_burst,
            global_rate: config.global_requests_per_second as f64,
            global_burst,
        }
    }

    fn check(&self, client_ip: &str) -> bool {
        if let Some(global) = &self.global {
            let mut bucket = global.lock().expect("rate limiter mutex poisoned");
            if !bucket.try_acquire(self.global_burst, self.global_rate) {
                return false;
            }
        }
        if self.ip_rate <= 0.0 {
            return true;
        }
        let mut bucket = self
            .per_ip
            .entry(client_ip.to_string())
            .or_insert_with(|| TokenBucket::new(self.ip_burst));
        bucket.try_acquire(self.ip_burst, self.ip_rate)
    }
}

fn effective_burst(rate: u32, burst: u32) -> f64 {
    if burst > 0 {
        burst as f64
    } else {
        // Burst defaults to 2x the sustained rate
        rate as f64 * 2.0
    }
}

/// Middleware rejecting over-limit clients with 429.
pub async fn rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client_ip = addr.ip().to_string();
    if state.check(&client_ip) {
        next.run(request).await
    } else {
        tracing::warn!(client = %client_ip, "Rate limit exceeded");
        metrics::record_rate_limited();
        let mut response = Response::new(Body::from("Rate limit exceeded"));
        *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;

    fn config(ip_rate: u32, ip_burst: u32, global_rate: u32, global_burst: u32) -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            requests_per_second: ip_rate,
            burst_size: ip_burst,
            global_requests_per_second: global_rate,
            global_burst_size: global_burst,
        }
    }

    #[test]
    fn unlimited_when_rates_are_zero() {
        let state = RateLimiterState::new(&config(0, 0, 0, 0));
        for _ in 0..100 {
            assert!(state.check("1.2.3.4"));
        }
    }

    #[test]
    fn per_ip_burst_is_enforced() {
        let state = RateLimiterState::new(&config(1, 5, 0, 0));
        let allowed = (0..20).filter(|_| state.check("1.2.3.4")).count();
        assert!(allowed >= 5 && allowed < 20, "allowed = {allowed}");
        // A different client gets its own bucket
        assert!(state.check("5.6.7.8"));
    }

    #[test]
    fn global_bucket_spans_clients() {
        let state = RateLimiterState::new(&config(0, 0, 1, 4));
        let mut allowed = 0;
        for i in 0..20 {
            if state.check(&format!("10.0.0.{i}")) {
                allowed += 1;
            }
        }
        assert!(allowed >= 4 && allowed < 20, "allowed = {allowed}");
    }
}
