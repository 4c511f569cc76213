//! The shared outbound HTTP client and its fetch operations.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::StatusCode;
use thiserror::Error;

use crate::security::{redirect_policy, GuardedResolver};

/// Hard cap on image bodies, applied after decompression. Oversized bodies
/// are truncated, not rejected.
pub const MAX_FETCH_BYTES: usize = 4 << 20; // 4 MiB

/// Separate, tighter cap for HTML documents.
pub const MAX_HTML_BYTES: usize = 1 << 20; // 1 MiB

/// Browser-like User-Agent; some origins refuse icon requests from
/// obviously non-browser clients.
pub const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/141.0.0.0 Safari/537.36";

const IMAGE_ACCEPT: &str = "image/*,image/avif,image/webp,*/*;q=0.8";
const HTML_ACCEPT: &str = "text/html,*/*;q=0.8";

const TOTAL_TIMEOUT: Duration = Duration::from_secs(12);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(7);
const MAX_IDLE_PER_HOST: usize = 4;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure: DNS, dial, timeout, blocked redirect.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),

    /// The target host is a literal IP inside a blocked range.
    #[error("blocked ip")]
    BlockedIp,

    /// The coalesced fetch task died before publishing a result.
    #[error("fetch aborted")]
    Aborted,
}

/// A fetched body plus the validator headers the cache stores alongside it.
/// Header values are kept as raw strings; empty means the origin sent none.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub body: Bytes,
    pub content_type: String,
    pub etag: String,
    pub last_modified: String,
}

/// Outcome of a conditional request.
#[derive(Debug)]
pub enum ConditionalFetch {
    NotModified,
    Fresh(FetchedBody),
}

/// The process-wide outbound fetcher.
///
/// Holds a single shared client so the idle-connection pool and the guarded
/// resolver are reused across requests. Passed explicitly as a collaborator
/// so tests can construct their own.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_UA)
            .gzip(true)
            .timeout(TOTAL_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .redirect(redirect_policy())
            .dns_resolver(Arc::new(GuardedResolver))
            .build()?;
        Ok(Self { client })
    }

    /// Unconditional GET of an image candidate. Rejects non-2xx statuses;
    /// truncates the body at [`MAX_FETCH_BYTES`].
    pub async fn fetch_full(&self, canon_url: &str) -> Result<FetchedBody, FetchError> {
        check_literal_host(canon_url)?;
        tracing::debug!(url = %canon_url, "fetching url");
        let resp = self
            .client
            .get(canon_url)
            .header(ACCEPT, IMAGE_ACCEPT)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(url = %canon_url, status = %status, "fetch got unexpected status");
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = header_string(resp.headers(), CONTENT_TYPE);
        let etag = header_string(resp.headers(), ETAG);
        let last_modified = header_string(resp.headers(), LAST_MODIFIED);
        let body = read_capped(resp, MAX_FETCH_BYTES).await?;

        tracing::debug!(url = %canon_url, bytes = body.len(), content_type = %content_type, "fetched");
        Ok(FetchedBody {
            body,
            content_type,
            etag,
            last_modified,
        })
    }

    /// Conditional GET with `If-None-Match` / `If-Modified-Since`.
    pub async fn fetch_conditional(
        &self,
        canon_url: &str,
        etag: &str,
        last_modified: &str,
    ) -> Result<ConditionalFetch, FetchError> {
        check_literal_host(canon_url)?;
        tracing::debug!(url = %canon_url, etag = %etag, last_modified = %last_modified, "conditional fetch");
        let mut req = self.client.get(canon_url).header(ACCEPT, IMAGE_ACCEPT);
        if !etag.is_empty() {
            req = req.header(IF_NONE_MATCH, etag);
        }
        if !last_modified.is_empty() {
            req = req.header(IF_MODIFIED_SINCE, last_modified);
        }

        let resp = req.send().await?;
        let status = resp.status();

        if status == StatusCode::NOT_MODIFIED {
            tracing::debug!(url = %canon_url, "origin confirmed cache entry (304)");
            return Ok(ConditionalFetch::NotModified);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = header_string(resp.headers(), CONTENT_TYPE);
        let new_etag = header_string(resp.headers(), ETAG);
        let new_last_modified = header_string(resp.headers(), LAST_MODIFIED);
        let body = read_capped(resp, MAX_FETCH_BYTES).await?;

        Ok(ConditionalFetch::Fresh(FetchedBody {
            body,
            content_type,
            etag: new_etag,
            last_modified: new_last_modified,
        }))
    }

    /// GET a page as HTML, capped at [`MAX_HTML_BYTES`].
    pub async fn fetch_html(&self, page_url: &str) -> Result<Bytes, FetchError> {
        check_literal_host(page_url)?;
        let resp = self
            .client
            .get(page_url)
            .header(ACCEPT, HTML_ACCEPT)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(url = %page_url, status = %status, "html fetch got unexpected status");
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(read_capped(resp, MAX_HTML_BYTES).await?)
    }
}

/// Literal-IP hosts skip DNS entirely, so the guarded resolver never sees
/// them; they get the same block check here before any connection. URLs the
/// client cannot parse fail at send time instead.
fn check_literal_host(url_str: &str) -> Result<(), FetchError> {
    use std::net::IpAddr;

    if let Ok(u) = url::Url::parse(url_str) {
        match u.host() {
            Some(url::Host::Ipv4(ip)) if crate::security::is_blocked_ip(IpAddr::V4(ip)) => {
                return Err(FetchError::BlockedIp);
            }
            Some(url::Host::Ipv6(ip)) if crate::security::is_blocked_ip(IpAddr::V6(ip)) => {
                return Err(FetchError::BlockedIp);
            }
            _ => {}
        }
    }
    Ok(())
}

fn header_string(headers: &reqwest::header::HeaderMap, name: reqwest::header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

/// Read a response body chunk-wise, truncating at `cap`. The cap applies to
/// decompressed bytes since the client inflates gzip transparently.
async fn read_capped(mut resp: reqwest::Response, cap: usize) -> Result<Bytes, reqwest::Error> {
    let mut buf: Vec<u8> = Vec::new();
    while let Some(chunk) = resp.chunk().await? {
        let remaining = cap - buf.len();
        if chunk.len() >= remaining {
            buf.extend_from_slice(&chunk[..remaining]);
            break;
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buf))
}
