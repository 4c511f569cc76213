//! Guarded DNS resolution and redirect validation for the outbound client.
//!
//! # Responsibilities
//! - Resolve hostnames with a bounded timeout
//! - Drop every blocked address from the answer
//! - Hand the connector exactly one validated address, so the socket dials
//!   the IP that passed the check (DNS rebinding defense)
//! - Re-validate scheme and literal-IP hosts on every redirect hop

use std::net::IpAddr;

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use tokio::net::lookup_host;

use crate::security::blocklist::is_blocked_ip;
use crate::security::DNS_TIMEOUT;

/// Maximum number of redirect hops the client follows.
pub const MAX_REDIRECTS: usize = 8;

/// DNS resolver that only ever yields routable addresses.
///
/// Returning a single address (the first non-blocked one) rather than the
/// filtered list keeps the dialed IP identical to the validated IP even if
/// the connector would otherwise iterate.
#[derive(Debug, Clone, Default)]
pub struct GuardedResolver;

impl Resolve for GuardedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(async move {
            let host = name.as_str().to_string();
            let answers = tokio::time::timeout(DNS_TIMEOUT, lookup_host((host.as_str(), 0)))
                .await
                .map_err(|_| box_err(format!("dns lookup timed out for {host}")))?
                .map_err(|e| box_err(format!("dns lookup failed for {host}: {e}")))?;

            let answers: Vec<_> = answers.collect();
            match answers.into_iter().find(|addr| !is_blocked_ip(addr.ip())) {
                Some(addr) => {
                    let iter: Addrs = Box::new(std::iter::once(addr));
                    Ok(iter)
                }
                None => Err(box_err(format!("all resolved ips are blocked for {host}"))),
            }
        })
    }
}

fn box_err(msg: String) -> Box<dyn std::error::Error + Send + Sync> {
    msg.into()
}

/// Redirect policy applied to every outbound request: bounded hop count,
/// http/https only, and literal-IP targets re-checked against the blocklist.
/// Hostname targets go back through [`GuardedResolver`] when dialed.
pub fn redirect_policy() -> reqwest::redirect::Policy {
    reqwest::redirect::Policy::custom(|attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        if !matches!(attempt.url().scheme(), "http" | "https") {
            return attempt.error("blocked redirect scheme");
        }
        let blocked_literal = match attempt.url().host() {
            Some(url::Host::Ipv4(ip)) => is_blocked_ip(IpAddr::V4(ip)),
            Some(url::Host::Ipv6(ip)) => is_blocked_ip(IpAddr::V6(ip)),
            _ => false,
        };
        if blocked_literal {
            return attempt.error("redirect to blocked ip");
        }
        attempt.follow()
    })
}
