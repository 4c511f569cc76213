//! Outbound HTTP fetching.
//!
//! # Responsibilities
//! - Canonicalize URLs into the identity used for every cache entry
//! - Own the single shared HTTP client (browser UA, gzip, guarded resolver,
//!   validated redirects, bounded connection pool)
//! - Fetch bodies with hard size caps, plainly or conditionally

pub mod canonical;
pub mod client;

pub use canonical::canonicalize_url_string;
pub use client::{
    ConditionalFetch, FetchError, FetchedBody, Fetcher, MAX_FETCH_BYTES, MAX_HTML_BYTES,
};
