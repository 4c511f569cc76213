//! Favicon discovery and candidate ranking.
//!
//! # Responsibilities
//! - Fetch a page as HTML and extract icon `<link>`s (tag-soup tolerant)
//! - Score candidates by rel kind, declared format and declared size
//! - Append the `/favicon.ico` root fallbacks
//! - Deduplicate by canonical URL
//!
//! Discovery depends on the fetcher; the fetcher knows nothing about
//! discovery.

pub mod classify;
pub mod parse;

use url::Url;

use crate::fetch::{canonicalize_url_string, Fetcher};
use crate::observability::metrics;

/// Size score used when a link declares no usable sizes (or `any`).
pub const SIZE_SCORE_UNKNOWN: i32 = 10_000;

/// A URL discovered as a possible favicon source, annotated with ranking
/// metadata. Lower ranks and scores sort first.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Canonical URL of the icon resource.
    pub url: String,
    /// Declared MIME type from the `type` attribute (possibly empty).
    pub mime_type: String,
    /// Edge lengths parsed from the `sizes` attribute.
    pub sizes: Vec<u32>,
    /// Distance of the closest declared edge to the target size.
    pub size_score: i32,
    /// 0 = raster formats we decode natively, 2 = svg, 1 = everything else.
    pub format_rank: u8,
    /// 1 = icon, 2 = apple-touch only, 3 = root fallback.
    pub rel_rank: u8,
}

/// Discover icon candidates for a page: parsed `<link>`s first, then the
/// `/favicon.ico` roots, sorted by (rel, format, size) and deduplicated.
pub async fn discover(fetcher: &Fetcher, page_url: &Url, target_size: u32) -> Vec<Candidate> {
    let mut candidates = collect_page_icons(fetcher, page_url, target_size).await;

    // Root fallbacks; the one matching the page scheme goes first.
    let host = page_url
        .host_str()
        .map(|h| match page_url.port() {
            Some(port) => format!("{h}:{port}"),
            None => h.to_string(),
        })
        .unwrap_or_default();
    let root_https = format!("https://{host}/favicon.ico");
    let root_http = format!("http://{host}/favicon.ico");
    let (first, second) = if page_url.scheme() == "https" {
        (root_https, root_http)
    } else {
        (root_http, root_https)
    };
    for url in [first, second] {
        candidates.push(Candidate {
            url,
            mime_type: String::new(),
            sizes: Vec::new(),
            size_score: 0,
            format_rank: 0,
            rel_rank: 3,
        });
    }

    candidates.sort_by(|a, b| {
        (a.rel_rank, a.format_rank, a.size_score).cmp(&(b.rel_rank, b.format_rank, b.size_score))
    });

    // Deduplicate by canonical URL, first occurrence wins.
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(candidates.len());
    for mut cand in candidates {
        let canon = canonicalize_url_string(&cand.url);
        if seen.insert(canon.clone()) {
            cand.url = canon;
            out.push(cand);
        }
    }

    tracing::debug!(page = %page_url, candidates = out.len(), "discovered icon candidates");
    metrics::record_candidates_found(out.len());
    out
}

async fn collect_page_icons(fetcher: &Fetcher, page_url: &Url, target_size: u32) -> Vec<Candidate> {
    let html = match fetcher.fetch_html(page_url.as_str()).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(page = %page_url, error = %e, "failed to fetch page html");
            return Vec::new();
        }
    };

    parse::extract_icon_links(&html, page_url)
        .into_iter()
        .map(|link| {
            let (sizes, any) = parse_sizes(&link.sizes);
            let size_score = compute_size_score(&sizes, any, target_size);
            let format_rank = format_preference(&link.mime_type, link.resolved.as_str());
            let rel_rank = if link.apple_only { 2 } else { 1 };
            Candidate {
                url: link.resolved.into(),
                mime_type: link.mime_type,
                sizes,
                size_score,
                format_rank,
                rel_rank,
            }
        })
        .collect()
}

/// Parse a `sizes` attribute: either the literal `any` or whitespace
/// separated `WxH` tokens, of which the width is kept.
fn parse_sizes(attr: &str) -> (Vec<u32>, bool) {
    if attr.is_empty() {
        return (Vec::new(), false);
    }
    if attr == "any" {
        return (Vec::new(), true);
    }
    let edges = attr
        .split_whitespace()
        .filter_map(|token| {
            let (w, _h) = token.split_once(['x', 'X'])?;
            w.parse::<u32>().ok()
        })
        .collect();
    (edges, false)
}

fn compute_size_score(edges: &[u32], any: bool, target: u32) -> i32 {
    if any || edges.is_empty() {
        return SIZE_SCORE_UNKNOWN;
    }
    edges
        .iter()
        .map(|&e| (e as i32 - target as i32).abs())
        .min()
        .unwrap_or(SIZE_SCORE_UNKNOWN)
}

/// Rank declared formats: natively decodable rasters first, svg last (it
/// needs the rasterizer and the blank gate), everything else in between.
fn format_preference(mime_type: &str, resolved: &str) -> u8 {
    let ct = classify::media_type(mime_type);
    let path = resolved.split(['?', '#']).next().unwrap_or(resolved);
    let ext = path
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();

    if ct == "image/svg+xml" || ext == "svg" {
        return 2;
    }
    if matches!(ct.as_str(), "image/png" | "image/x-icon" | "image/webp" | "image/avif")
        || matches!(ext.as_str(), "png" | "ico" | "webp" | "avif")
    {
        return 0;
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_attribute_parsing() {
        assert_eq!(parse_sizes(""), (vec![], false));
        assert_eq!(parse_sizes("any"), (vec![], true));
        assert_eq!(parse_sizes("16x16"), (vec![16], false));
        assert_eq!(parse_sizes("16x16 32x32 64x64"), (vec![16, 32, 64], false));
        assert_eq!(parse_sizes("180X180"), (vec![180], false));
        assert_eq!(parse_sizes("garbage"), (vec![], false));
    }

    #[test]
    fn size_score_picks_closest_edge() {
        assert_eq!(compute_size_score(&[16, 32, 64], false, 48), 16);
        assert_eq!(compute_size_score(&[16], false, 64), 48);
        assert_eq!(compute_size_score(&[], false, 32), SIZE_SCORE_UNKNOWN);
        assert_eq!(compute_size_score(&[16], true, 32), SIZE_SCORE_UNKNOWN);
    }

    #[test]
    fn format_preference_ranks() {
        assert_eq!(format_preference("image/png", "https://a/icon"), 0);
        assert_eq!(format_preference("", "https://a/favicon.ico"), 0);
        assert_eq!(format_preference("image/webp", "https://a/i"), 0);
        assert_eq!(format_preference("image/svg+xml", "https://a/i"), 2);
        assert_eq!(format_preference("", "https://a/logo.svg"), 2);
        assert_eq!(format_preference("image/jpeg", "https://a/photo.jpg"), 1);
        // mime parameters are stripped before comparison
        assert_eq!(format_preference("image/png; charset=binary", "https://a/i"), 0);
        // query strings do not confuse the extension check
        assert_eq!(format_preference("", "https://a/icon.svg?v=2"), 2);
    }
}
