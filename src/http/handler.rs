//! The /favicons request handler.
//!
//! Every failure mode in here collapses to serving the fallback globe at
//! HTTP 200: clients embed the result in `<img>` tags, and a stable image
//! beats a broken one. Errors surface through logs and metrics only.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, Response, StatusCode};
use bytes::Bytes;
use image::DynamicImage;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use time::macros::format_description;
use time::OffsetDateTime;

use crate::cache::{Group, Manager, OrigMeta};
use crate::config::ResponseConfig;
use crate::discovery::{self, classify};
use crate::fetch::{canonicalize_url_string, ConditionalFetch, Fetcher};
use crate::imaging::{self, OutputFormat};
use crate::observability::metrics;
use crate::security;

pub const DEFAULT_SIZE: u32 = 32;
pub const MIN_SIZE: u32 = 16;
pub const MAX_SIZE: u32 = 256;

/// Effective area credited to an SVG that rasterized successfully; it beats
/// any raster source.
const SVG_AREA_SENTINEL: i64 = 1 << 50;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Fetcher,
    pub cache: Manager,
    pub fetch_group: Arc<Group>,
    pub response: ResponseConfig,
}

/// Query parameters of /favicons. `sz` wins over `size` when both appear.
#[derive(Debug, Default, Deserialize)]
pub struct FaviconParams {
    pub url: Option<String>,
    pub domain: Option<String>,
    pub sz: Option<String>,
    pub size: Option<String>,
}

impl FaviconParams {
    /// Requested output edge, clamped to [16, 256]; unparseable or absent
    /// values fall back to the default.
    pub fn clamped_size(&self) -> u32 {
        let raw = self
            .sz
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.size.as_deref());
        match raw.and_then(|s| s.trim().parse::<i64>().ok()) {
            Some(n) => n.clamp(MIN_SIZE as i64, MAX_SIZE as i64) as u32,
            None => DEFAULT_SIZE,
        }
    }

    /// The page URL to discover icons for; a bare `domain` gets `https://`.
    fn page_url(&self) -> Option<String> {
        if let Some(url) = self.url.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            return Some(url.to_string());
        }
        self.domain
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|d| format!("https://{d}"))
    }
}

/// GET /favicons?url=<u>|domain=<d>[&sz=<n>]
pub async fn favicon_handler(
    State(state): State<AppState>,
    Query(params): Query<FaviconParams>,
    headers: HeaderMap,
) -> Response<Body> {
    let start = Instant::now();
    let size = params.clamped_size();
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let format = OutputFormat::from_accept(accept);

    let Some(page) = params.page_url() else {
        return serve_fallback(&state, &headers, size, format, start);
    };

    let page_url = match security::normalize_url(&page).await {
        Ok(u) => u,
        Err(e) => {
            tracing::warn!(url = %page, error = %e, "invalid page url");
            return serve_fallback(&state, &headers, size, format, start);
        }
    };

    let candidates = discovery::discover(&state.fetcher, &page_url, size).await;

    let mut best: Option<(DynamicImage, i64, String)> = None;
    for cand in candidates {
        let Some((body, content_type)) = cached_fetch(&state, &cand.url).await else {
            continue;
        };
        if body.is_empty() || classify::looks_like_html(&body, &content_type) {
            continue;
        }

        let decoded = if classify::is_svg(&content_type, &cand.url) {
            match imaging::rasterize_svg(&body, size, size) {
                Ok(img) => (img, SVG_AREA_SENTINEL),
                Err(e) => {
                    tracing::debug!(url = %cand.url, error = %e, "svg candidate rejected");
                    continue;
                }
            }
        } else if classify::is_ico(&content_type, &cand.url) {
            match imaging::decode_ico(&body) {
                Ok(img) => {
                    let area = i64::from(img.width()) * i64::from(img.height());
                    (img, area)
                }
                Err(e) => {
                    tracing::debug!(url = %cand.url, error = %e, "ico candidate rejected");
                    continue;
                }
            }
        } else {
            match imaging::decode_raster(&body) {
                Ok(img) => {
                    let area = i64::from(img.width()) * i64::from(img.height());
                    (img, area)
                }
                Err(e) => {
                    tracing::debug!(url = %cand.url, error = %e, "raster candidate rejected");
                    continue;
                }
            }
        };

        let (img, area) = decoded;
        if best.as_ref().is_none_or(|(_, best_area, _)| area > *best_area) {
            best = Some((img, area, cand.url));
        }
    }

    match best {
        Some((img, _, src_url)) => {
            serve_from_source(&state, &headers, &img, size, format, &src_url, start).await
        }
        None => serve_fallback(&state, &headers, size, format, start),
    }
}

/// Serve the winning candidate, going through the derived-variant cache.
async fn serve_from_source(
    state: &AppState,
    req_headers: &HeaderMap,
    img: &DynamicImage,
    size: u32,
    format: OutputFormat,
    src_url: &str,
    start: Instant,
) -> Response<Body> {
    if let Some((body, modified)) = state.cache.read_derived(src_url, size, format.as_str()).await
    {
        if !body.is_empty() {
            metrics::record_cache_hit("derived");
            let sniffed = classify::sniff_content_type(&body);
            let content_type = if sniffed.starts_with("image/") {
                sniffed
            } else {
                format.content_type()
            };
            return serve_bytes(state, req_headers, &body, content_type, Some(modified), start);
        }
    }
    metrics::record_cache_miss("derived");

    let resized = imaging::resize_to(img, size);
    let (body, content_type) = imaging::encode(&resized, format);

    if let Err(e) = state
        .cache
        .write_derived(src_url, size, format.as_str(), &body)
        .await
    {
        tracing::warn!(url = %src_url, error = %e, "failed to cache derived variant");
    }
    serve_bytes(state, req_headers, &body, content_type, None, start)
}

/// Serve the deterministic fallback globe.
fn serve_fallback(
    state: &AppState,
    req_headers: &HeaderMap,
    size: u32,
    format: OutputFormat,
    start: Instant,
) -> Response<Body> {
    metrics::record_fallback_served();
    let img = imaging::fallback_image(size);
    let (body, content_type) = imaging::encode(&img, format);
    serve_bytes(state, req_headers, &body, content_type, None, start)
}

/// Write the response: strong validators, negotiated content type, cache
/// headers, and a 304 when the client already holds these bytes.
fn serve_bytes(
    state: &AppState,
    req_headers: &HeaderMap,
    body: &[u8],
    content_type: &str,
    last_modified: Option<SystemTime>,
    start: Instant,
) -> Response<Body> {
    let etag = make_etag(body);
    let (cache_control, surrogate_control, expires) = cache_header_values(&state.response);

    if state.response.use_etag {
        let if_none_match = req_headers
            .get(header::IF_NONE_MATCH)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !if_none_match.is_empty() && if_none_match == etag {
            metrics::record_request(304, content_type, start);
            return response_builder(StatusCode::NOT_MODIFIED)
                .header(header::ETAG, etag.as_str())
                .header(header::CACHE_CONTROL, cache_control.as_str())
                .header("Surrogate-Control", surrogate_control.as_str())
                .header(header::EXPIRES, expires.as_str())
                .body(Body::empty())
                .unwrap_or_else(|_| fallback_response());
        }
    }

    let mut builder = response_builder(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, body.len())
        .header(header::CACHE_CONTROL, cache_control.as_str())
        .header("Surrogate-Control", surrogate_control.as_str())
        .header(header::EXPIRES, expires.as_str());
    if state.response.use_etag {
        builder = builder.header(header::ETAG, etag.as_str());
    }
    let modified = last_modified.unwrap_or_else(SystemTime::now);
    builder = builder.header(header::LAST_MODIFIED, http_date(modified));

    metrics::record_request(200, content_type, start);
    builder
        .body(Body::from(body.to_vec()))
        .unwrap_or_else(|_| fallback_response())
}

fn response_builder(status: StatusCode) -> axum::http::response::Builder {
    Response::builder()
        .status(status)
        .header(header::VARY, "Accept")
}

/// Absolute last resort if header assembly itself errors.
fn fallback_response() -> Response<Body> {
    let mut resp = Response::new(Body::empty());
    *resp.status_mut() = StatusCode::OK;
    resp
}

/// Strong validator: hex of the first 16 bytes of sha256 over the encoded
/// body, quoted.
fn make_etag(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    let hex: String = digest[..16].iter().map(|b| format!("{b:02x}")).collect();
    format!("\"{hex}\"")
}

fn cache_header_values(cfg: &ResponseConfig) -> (String, String, String) {
    let browser_secs = if cfg.browser_max_age_secs == 0 {
        86400
    } else {
        cfg.browser_max_age_secs
    };
    let cdn_secs = if cfg.cdn_s_maxage_secs == 0 {
        browser_secs
    } else {
        cfg.cdn_s_maxage_secs
    };
    let cache_control =
        format!("public, max-age={browser_secs}, s-maxage={cdn_secs}, immutable");
    let surrogate_control = format!("max-age={cdn_secs}");
    let expires = http_date(SystemTime::now() + Duration::from_secs(browser_secs));
    (cache_control, surrogate_control, expires)
}

/// RFC 7231 HTTP-date, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
fn http_date(t: SystemTime) -> String {
    let dt = OffsetDateTime::from(t);
    let format = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );
    dt.format(&format).unwrap_or_default()
}

/// Fetch a candidate through the cache:
///   1. hit with validators → conditional revalidation (304 touches, 2xx
///      overwrites, errors serve stale)
///   2. hit without validators → cached bytes
///   3. miss → coalesced origin fetch + cache fill
///
/// The content type is sniffed from bytes whenever the origin did not send
/// one.
async fn cached_fetch(state: &AppState, icon_url: &str) -> Option<(Bytes, String)> {
    let canon = canonicalize_url_string(icon_url);
    let cache = &state.cache;

    if let Some(cached) = cache.read_orig(&canon).await {
        metrics::record_cache_hit("orig");
        let meta = cache.read_orig_meta(&canon).await.unwrap_or_default();
        if meta.has_validators() {
            match state
                .fetcher
                .fetch_conditional(&canon, &meta.etag, &meta.last_modified)
                .await
            {
                Ok(ConditionalFetch::NotModified) => {
                    if let Err(e) = cache.touch_orig(&canon) {
                        tracing::debug!(url = %canon, error = %e, "failed to touch cache entry");
                    }
                    let refreshed = OrigMeta::new(&canon, &meta.etag, &meta.last_modified);
                    if let Err(e) = cache.write_orig_meta(&canon, &refreshed).await {
                        tracing::debug!(url = %canon, error = %e, "failed to refresh meta");
                    }
                    let content_type = classify::sniff_content_type(&cached).to_string();
                    return Some((cached, content_type));
                }
                Ok(ConditionalFetch::Fresh(fresh)) if !fresh.body.is_empty() => {
                    if let Err(e) = cache.write_orig(&canon, &fresh.body).await {
                        tracing::warn!(url = %canon, error = %e, "failed to overwrite cache entry");
                    }
                    let meta = OrigMeta::new(&canon, &fresh.etag, &fresh.last_modified);
                    if let Err(e) = cache.write_orig_meta(&canon, &meta).await {
                        tracing::debug!(url = %canon, error = %e, "failed to write meta");
                    }
                    let content_type = content_type_or_sniff(fresh.content_type, &fresh.body);
                    return Some((fresh.body, content_type));
                }
                Ok(ConditionalFetch::Fresh(_)) | Err(_) => {
                    // Revalidation failed; the stale copy is still an icon.
                    let content_type = classify::sniff_content_type(&cached).to_string();
                    return Some((cached, content_type));
                }
            }
        }
        let content_type = classify::sniff_content_type(&cached).to_string();
        return Some((cached, content_type));
    }
    metrics::record_cache_miss("orig");

    let fetcher = state.fetcher.clone();
    let cache_for_task = state.cache.clone();
    let canon_for_task = canon.clone();
    let result = state
        .fetch_group
        .run(&canon, move || async move {
            // Another task may have committed the entry while this one
            // queued for the flight.
            if let Some(cached) = cache_for_task.read_orig(&canon_for_task).await {
                return Ok(cached);
            }
            match fetcher.fetch_full(&canon_for_task).await {
                Ok(fetched) => {
                    metrics::record_origin_fetch(true);
                    if let Err(e) = cache_for_task.write_orig(&canon_for_task, &fetched.body).await
                    {
                        tracing::warn!(url = %canon_for_task, error = %e, "failed to cache origin bytes");
                    }
                    let meta =
                        OrigMeta::new(&canon_for_task, &fetched.etag, &fetched.last_modified);
                    if let Err(e) = cache_for_task.write_orig_meta(&canon_for_task, &meta).await {
                        tracing::debug!(url = %canon_for_task, error = %e, "failed to write meta");
                    }
                    Ok(fetched.body)
                }
                Err(e) => {
                    metrics::record_origin_fetch(false);
                    Err(e)
                }
            }
        })
        .await;

    match result {
        Ok(body) => {
            let content_type = classify::sniff_content_type(&body).to_string();
            Some((body, content_type))
        }
        Err(e) => {
            tracing::debug!(url = %canon, error = %e, "origin fetch failed");
            None
        }
    }
}

fn content_type_or_sniff(content_type: String, body: &Bytes) -> String {
    if content_type.is_empty() {
        classify::sniff_content_type(body).to_string()
    } else {
        content_type
    }
}

/// GET /health
pub async fn health_handler() -> Response<Body> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"status":"ok"}"#))
        .unwrap_or_else(|_| fallback_response())
}
