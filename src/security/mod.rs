//! Outbound-request hardening.
//!
//! # Responsibilities
//! - Maintain the blocked IP range table (loopback, RFC 1918, link-local,
//!   CGNAT, multicast, reserved, unique-local v6)
//! - Validate and normalize user-supplied URLs before any network contact
//! - Resolve hostnames through a guarded resolver that pins connections to
//!   a validated address (DNS rebinding defense)
//! - Rate-limit inbound clients
//!
//! # Design Decisions
//! - The blocklist is a fixed table checked with plain address arithmetic;
//!   nothing is configurable at runtime
//! - Validation happens twice: once in [`normalize_url`] before the request
//!   pipeline starts, and again at resolution time for every outbound
//!   connection, so a DNS answer that changes between the two cannot
//!   redirect a fetch into a private range

pub mod blocklist;
pub mod normalize;
pub mod rate_limit;
pub mod resolver;

pub use blocklist::is_blocked_ip;
pub use normalize::{is_allowed_scheme, normalize_url, SecurityError};
pub use resolver::{redirect_policy, GuardedResolver};

use std::time::Duration;

/// Ceiling on DNS resolution, applied both during URL normalization and in
/// the guarded resolver.
pub const DNS_TIMEOUT: Duration = Duration::from_secs(2);
