//! Icon link extraction from HTML.
//!
//! Real-world pages are tag soup; the html5ever tree builder recovers the
//! same way browsers do, so `<link>`s inside unclosed `<head>`s or stray
//! markup still surface here.

use html5ever::tendril::TendrilSink;
use html5ever::{parse_document, ParseOpts};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use url::Url;

use crate::security::is_allowed_scheme;

/// An icon `<link>` with its `href` already resolved against the effective
/// base URL and validated for scheme.
#[derive(Debug)]
pub struct IconLink {
    pub resolved: Url,
    pub mime_type: String,
    pub sizes: String,
    /// True when the rel tokens only contained apple-touch variants.
    pub apple_only: bool,
}

/// Parse `html` and collect every `<link>` whose rel tokens mark it as an
/// icon. `<base href>` is honored for resolution from the point it appears.
pub fn extract_icon_links(html: &[u8], page_url: &Url) -> Vec<IconLink> {
    let mut cursor = std::io::Cursor::new(html);
    let dom = match parse_document(RcDom::default(), ParseOpts::default())
        .from_utf8()
        .read_from(&mut cursor)
    {
        Ok(dom) => dom,
        Err(e) => {
            tracing::warn!(page = %page_url, error = %e, "failed to parse page html");
            return Vec::new();
        }
    };

    let mut walker = Walker {
        page_url,
        base_href: None,
        out: Vec::new(),
    };
    walker.visit(&dom.document);
    walker.out
}

struct Walker<'a> {
    page_url: &'a Url,
    base_href: Option<Url>,
    out: Vec<IconLink>,
}

impl Walker<'_> {
    fn visit(&mut self, node: &Handle) {
        if let NodeData::Element { name, attrs, .. } = &node.data {
            match name.local.as_ref() {
                "base" => self.visit_base(&attrs.borrow()),
                "link" => self.visit_link(&attrs.borrow()),
                _ => {}
            }
        }
        for child in node.children.borrow().iter() {
            self.visit(child);
        }
    }

    fn visit_base(&mut self, attrs: &[html5ever::Attribute]) {
        for attr in attrs {
            if attr.name.local.as_ref() == "href" {
                if let Ok(base) = self.page_url.join(attr.value.trim()) {
                    self.base_href = Some(base);
                }
            }
        }
    }

    fn visit_link(&mut self, attrs: &[html5ever::Attribute]) {
        let mut rel = String::new();
        let mut href = String::new();
        let mut mime_type = String::new();
        let mut sizes = String::new();

        for attr in attrs {
            let value = attr.value.trim();
            match attr.name.local.as_ref() {
                "rel" => rel = value.to_ascii_lowercase(),
                "href" => href = value.to_string(),
                "type" => mime_type = value.to_ascii_lowercase(),
                "sizes" => sizes = value.to_ascii_lowercase(),
                _ => {}
            }
        }

        if rel.is_empty() || href.is_empty() {
            return;
        }

        let mut has_icon = false;
        let mut is_apple = false;
        for token in rel.split_whitespace() {
            match token {
                "icon" => has_icon = true,
                "apple-touch-icon" | "apple-touch-icon-precomposed" => is_apple = true,
                _ => {}
            }
        }
        if rel.contains("shortcut icon") {
            has_icon = true;
        }
        if rel.contains("apple-touch-icon") {
            is_apple = true;
        }
        if !has_icon && !is_apple {
            return;
        }

        let base = self.base_href.as_ref().unwrap_or(self.page_url);
        let Ok(resolved) = base.join(&href) else {
            return;
        };
        if !is_allowed_scheme(&resolved) {
            return;
        }

        self.out.push(IconLink {
            resolved,
            mime_type,
            sizes,
            apple_only: is_apple && !has_icon,
        });
    }
}
