//! URL validation ahead of the fetch pipeline.

use std::net::IpAddr;

use thiserror::Error;
use tokio::net::lookup_host;
use url::{Host, Url};

use crate::security::blocklist::is_blocked_ip;
use crate::security::DNS_TIMEOUT;

/// Reasons a user-supplied URL is refused before any network contact.
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("empty hostname")]
    EmptyHost,

    #[error("only http/https allowed")]
    InvalidScheme,

    #[error("localhost not allowed")]
    BlockedHost,

    #[error("private ip not allowed")]
    BlockedIp,

    #[error("hostname must contain a dot")]
    DotlessHost,

    #[error("hostname not resolvable")]
    UnresolvableHost,

    #[error("hostname resolves to private ranges only")]
    PrivateOnlyHost,

    #[error("all resolved ips are blocked")]
    AllResolvedBlocked,
}

/// True when the URL uses a scheme the fetcher is willing to follow.
pub fn is_allowed_scheme(u: &Url) -> bool {
    matches!(u.scheme(), "http" | "https")
}

/// Parse and validate a URL string, defaulting to `https://` when no scheme
/// is present.
///
/// Checks, in order: parseability, non-empty host, http/https scheme,
/// `localhost` rejection, blocklist membership for literal IPs, and for
/// hostnames a dot requirement plus a DNS probe that must produce at least
/// one routable address within [`DNS_TIMEOUT`].
pub async fn normalize_url(input: &str) -> Result<Url, SecurityError> {
    let raw = if input.contains("://") {
        input.to_string()
    } else {
        format!("https://{input}")
    };

    let parsed = Url::parse(&raw)?;
    if !is_allowed_scheme(&parsed) {
        return Err(SecurityError::InvalidScheme);
    }

    enum HostKind {
        Ip(IpAddr),
        Domain(String),
    }
    let host = match parsed.host() {
        None => return Err(SecurityError::EmptyHost),
        Some(Host::Ipv4(ip)) => HostKind::Ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => HostKind::Ip(IpAddr::V6(ip)),
        Some(Host::Domain(domain)) => HostKind::Domain(domain.to_string()),
    };

    match host {
        HostKind::Ip(ip) if is_blocked_ip(ip) => Err(SecurityError::BlockedIp),
        HostKind::Ip(_) => Ok(parsed),
        HostKind::Domain(domain) => {
            if domain.is_empty() {
                return Err(SecurityError::EmptyHost);
            }
            if domain.eq_ignore_ascii_case("localhost") {
                return Err(SecurityError::BlockedHost);
            }
            if !domain.contains('.') {
                return Err(SecurityError::DotlessHost);
            }

            let addrs = tokio::time::timeout(DNS_TIMEOUT, lookup_host((domain.as_str(), 443)))
                .await
                .map_err(|_| SecurityError::UnresolvableHost)?
                .map_err(|_| SecurityError::UnresolvableHost)?
                .collect::<Vec<_>>();

            if addrs.is_empty() {
                return Err(SecurityError::UnresolvableHost);
            }
            if addrs.iter().any(|a| !is_blocked_ip(a.ip())) {
                Ok(parsed)
            } else {
                Err(SecurityError::PrivateOnlyHost)
            }
        }
    }
}
