//! URL canonicalization.
//!
//! Two URLs that canonicalize equal must produce identical cache keys, so
//! everything that touches the cache goes through [`canonicalize_url_string`]
//! first.

use url::Url;

/// Normalize a URL string for consistent comparison and cache keying.
///
/// Lowercases scheme and host, strips default ports, defaults and cleans the
/// path, removes the fragment, and re-encodes the query with keys and values
/// sorted ascending. Unparseable input is returned unchanged; callers treat
/// it as an opaque (and almost certainly unfetchable) key.
pub fn canonicalize_url_string(raw: &str) -> String {
    let Ok(mut u) = Url::parse(raw) else {
        return raw.to_string();
    };

    u.set_fragment(None);

    // The parser already lowercases scheme and host, resolves dot segments,
    // defaults the path to "/" and drops default ports on serialization.
    // The query is the one part that needs explicit normalization.
    let mut pairs: Vec<(String, String)> = u
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if pairs.is_empty() {
        u.set_query(None);
    } else {
        pairs.sort();
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in &pairs {
            serializer.append_pair(k, v);
        }
        let query = serializer.finish();
        u.set_query(Some(&query));
    }

    u.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_strips_default_ports() {
        assert_eq!(
            canonicalize_url_string("https://Example.COM/Path"),
            "https://example.com/Path"
        );
        assert_eq!(
            canonicalize_url_string("https://example.com:443/path"),
            "https://example.com/path"
        );
        assert_eq!(
            canonicalize_url_string("http://example.com:80/path"),
            "http://example.com/path"
        );
        // Non-default ports survive
        assert_eq!(
            canonicalize_url_string("http://example.com:8080/path"),
            "http://example.com:8080/path"
        );
    }

    #[test]
    fn sorts_query_and_drops_fragment() {
        assert_eq!(
            canonicalize_url_string("https://example.com/path?b=2&a=1"),
            "https://example.com/path?a=1&b=2"
        );
        assert_eq!(
            canonicalize_url_string("https://example.com#fragment"),
            "https://example.com/"
        );
        assert_eq!(
            canonicalize_url_string("https://example.com"),
            "https://example.com/"
        );
    }

    #[test]
    fn multi_valued_keys_sort_by_value() {
        assert_eq!(
            canonicalize_url_string("https://example.com/?k=z&k=a&j=1"),
            "https://example.com/?j=1&k=a&k=z"
        );
    }

    #[test]
    fn idempotent() {
        let inputs = [
            "https://Example.COM:443/a?b=2&a=1",
            "http://example.com/x/../y",
            "https://example.com/?q=a+b",
            "not a url at all",
            "https://example.com/%7Euser?x=%2F",
        ];
        for input in inputs {
            let once = canonicalize_url_string(input);
            let twice = canonicalize_url_string(&once);
            assert_eq!(once, twice, "canonicalization must be idempotent: {input}");
        }
    }

    #[test]
    fn equivalence_classes_collapse() {
        assert_eq!(
            canonicalize_url_string("https://Example.COM:443/a?b=2&a=1"),
            canonicalize_url_string("https://example.com/a?a=1&b=2")
        );
    }

    #[test]
    fn cleans_dot_segments() {
        assert_eq!(
            canonicalize_url_string("https://example.com/a/b/../c/./d"),
            "https://example.com/a/c/d"
        );
    }
}
