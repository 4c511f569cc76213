//! Byte and content-type classification for fetched candidates.

/// Strip parameters from a MIME string: `image/png; charset=binary` →
/// `image/png`.
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

fn url_extension(src_url: &str) -> String {
    let path = src_url.split(['?', '#']).next().unwrap_or(src_url);
    path.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// True when the MIME type or URL extension marks the resource as ICO.
pub fn is_ico(content_type: &str, src_url: &str) -> bool {
    let ct = media_type(content_type);
    ct == "image/x-icon" || ct == "image/vnd.microsoft.icon" || url_extension(src_url) == "ico"
}

/// True when the MIME type or URL extension marks the resource as SVG.
/// The URL check compensates for origins that serve SVG as `text/xml`.
pub fn is_svg(content_type: &str, src_url: &str) -> bool {
    media_type(content_type) == "image/svg+xml" || url_extension(src_url) == "svg"
}

/// True when the body is an HTML document rather than an image — either by
/// declared content type or by sniffing the first bytes. Used to keep error
/// pages served with image paths out of the pipeline.
pub fn looks_like_html(body: &[u8], content_type: &str) -> bool {
    if !content_type.is_empty() && media_type(content_type).contains("html") {
        return true;
    }
    let head = &body[..body.len().min(512)];
    let text = String::from_utf8_lossy(head).to_lowercase();
    let trimmed = text.trim_start();
    trimmed.starts_with("<!doctype html") || trimmed.starts_with("<html")
}

/// Sniff a content type from stored bytes, for cache entries whose origin
/// never sent one. Covers the formats the pipeline meets; note that an
/// extension-less SVG sniffs as `text/xml` here (its XML prolog wins), which
/// is why [`is_svg`] also checks the URL.
pub fn sniff_content_type(body: &[u8]) -> &'static str {
    let head = &body[..body.len().min(512)];

    if head.starts_with(&[0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a]) {
        return "image/png";
    }
    if head.starts_with(&[0xff, 0xd8, 0xff]) {
        return "image/jpeg";
    }
    if head.starts_with(b"GIF87a") || head.starts_with(b"GIF89a") {
        return "image/gif";
    }
    if head.len() >= 12 && &head[0..4] == b"RIFF" && &head[8..12] == b"WEBP" {
        return "image/webp";
    }
    if head.len() >= 12 && &head[4..8] == b"ftyp" && (&head[8..12] == b"avif" || &head[8..12] == b"avis") {
        return "image/avif";
    }
    if head.starts_with(&[0x00, 0x00, 0x01, 0x00]) {
        return "image/x-icon";
    }
    if head.starts_with(b"BM") {
        return "image/bmp";
    }

    let text = String::from_utf8_lossy(head).to_lowercase();
    let trimmed = text.trim_start();
    if trimmed.starts_with("<!doctype html") || trimmed.starts_with("<html") {
        return "text/html; charset=utf-8";
    }
    if trimmed.starts_with("<?xml") {
        return "text/xml; charset=utf-8";
    }

    "application/octet-stream"
}
