//! On-disk content cache.
//!
//! # Responsibilities
//! - Store raw upstream bytes (`orig/`) with validator metadata sidecars
//! - Store resized+encoded variants (`resized/`) keyed by source, size and
//!   format
//! - Enforce TTLs on read; a periodic janitor deletes expired files and
//!   bounds total size
//! - Coalesce concurrent origin fetches per canonical URL
//!
//! # Design Decisions
//! - The filesystem is the source of truth: no in-memory index, no
//!   cross-process locking. Atomicity comes from temp-file + rename, so a
//!   concurrent reader sees either the old bytes or the new ones, never a
//!   torn file
//! - Keys are the first 16 bytes of SHA-256, hex encoded. A collision makes
//!   one URL serve another URL's icon — a functional nuisance, not
//!   corruption — which is an acceptable trade at ~10^-19 probability for
//!   10^9 entries
//! - Expired entries are reported as misses but never deleted on the read
//!   path; cleanup is the janitor's job

pub mod janitor;
pub mod singleflight;

pub use janitor::{Janitor, JanitorHandle};
pub use singleflight::Group;

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
#[error("cache io: {0}")]
pub struct CacheError(#[from] std::io::Error);

/// Validator metadata stored beside an original cache entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrigMeta {
    pub url: String,
    #[serde(default)]
    pub etag: String,
    #[serde(default)]
    pub last_modified: String,
    /// Unix seconds; bumped when a 304 confirms the entry.
    #[serde(default)]
    pub updated_at: u64,
}

impl OrigMeta {
    pub fn new(url: &str, etag: &str, last_modified: &str) -> Self {
        Self {
            url: url.to_string(),
            etag: etag.to_string(),
            last_modified: last_modified.to_string(),
            updated_at: now_secs(),
        }
    }

    /// Whether a conditional request can be issued for this entry.
    pub fn has_validators(&self) -> bool {
        !self.etag.is_empty() || !self.last_modified.is_empty()
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Filesystem cache manager. Exclusively owns everything under its root.
#[derive(Debug, Clone)]
pub struct Manager {
    root: PathBuf,
    ttl: Duration,
}

impl Manager {
    pub fn new(root: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            root: root.into(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn orig_dir(&self) -> PathBuf {
        self.root.join("orig")
    }

    pub fn resized_dir(&self) -> PathBuf {
        self.root.join("resized")
    }

    pub fn fallback_dir(&self) -> PathBuf {
        self.root.join("fallback")
    }

    /// Create the cache directory layout. Idempotent.
    pub async fn ensure_dirs(&self) -> Result<(), CacheError> {
        for dir in [self.orig_dir(), self.resized_dir(), self.fallback_dir()] {
            fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }

    fn cache_key(input: &str) -> String {
        let digest = Sha256::digest(input.as_bytes());
        digest[..16].iter().map(|b| format!("{b:02x}")).collect()
    }

    fn orig_path(&self, canon_url: &str) -> PathBuf {
        self.orig_dir().join(format!("{}.bin", Self::cache_key(canon_url)))
    }

    fn orig_meta_path(&self, canon_url: &str) -> PathBuf {
        self.orig_dir().join(format!("{}.meta", Self::cache_key(canon_url)))
    }

    fn derived_path(&self, canon_url: &str, size: u32, format: &str) -> PathBuf {
        let key = Self::cache_key(&format!("{canon_url}|{size}|{format}"));
        self.resized_dir().join(format!("{key}.bin"))
    }

    /// Read original bytes; `None` when absent or older than the TTL.
    pub async fn read_orig(&self, canon_url: &str) -> Option<Bytes> {
        self.read_fresh(&self.orig_path(canon_url)).await.map(|(b, _)| b)
    }

    /// Atomically write original bytes, refreshing the entry's age.
    pub async fn write_orig(&self, canon_url: &str, body: &[u8]) -> Result<(), CacheError> {
        write_atomic(&self.orig_path(canon_url), body).await?;
        Ok(())
    }

    pub async fn read_orig_meta(&self, canon_url: &str) -> Option<OrigMeta> {
        let raw = fs::read(self.orig_meta_path(canon_url)).await.ok()?;
        serde_json::from_slice(&raw).ok()
    }

    pub async fn write_orig_meta(&self, canon_url: &str, meta: &OrigMeta) -> Result<(), CacheError> {
        let raw = serde_json::to_vec(meta).map_err(std::io::Error::other)?;
        write_atomic(&self.orig_meta_path(canon_url), &raw).await?;
        Ok(())
    }

    /// Bump an original entry's modtime, extending its TTL after a 304.
    pub fn touch_orig(&self, canon_url: &str) -> Result<(), CacheError> {
        let file = std::fs::File::options()
            .write(true)
            .open(self.orig_path(canon_url))?;
        file.set_modified(SystemTime::now())?;
        Ok(())
    }

    /// Read a derived variant with its modtime; `None` when absent/expired.
    pub async fn read_derived(
        &self,
        canon_url: &str,
        size: u32,
        format: &str,
    ) -> Option<(Bytes, SystemTime)> {
        self.read_fresh(&self.derived_path(canon_url, size, format)).await
    }

    pub async fn write_derived(
        &self,
        canon_url: &str,
        size: u32,
        format: &str,
        body: &[u8],
    ) -> Result<(), CacheError> {
        write_atomic(&self.derived_path(canon_url, size, format), body).await?;
        Ok(())
    }

    async fn read_fresh(&self, path: &Path) -> Option<(Bytes, SystemTime)> {
        let meta = fs::metadata(path).await.ok()?;
        let modified = meta.modified().ok()?;
        let age = SystemTime::now().duration_since(modified).unwrap_or_default();
        if age > self.ttl {
            return None;
        }
        let body = fs::read(path).await.ok()?;
        Some((Bytes::from(body), modified))
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

async fn write_atomic(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let tmp = tmp_path(path);
    fs::write(&tmp, body).await?;
    fs::rename(&tmp, path).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(ttl: Duration) -> (tempfile::TempDir, Manager) {
        let dir = tempfile::tempdir().unwrap();
        let m = Manager::new(dir.path(), ttl);
        (dir, m)
    }

    #[tokio::test]
    async fn orig_round_trip() {
        let (_dir, m) = manager(Duration::from_secs(3600));
        m.ensure_dirs().await.unwrap();

        let url = "https://example.com/favicon.ico";
        let body = b"test favicon data";
        m.write_orig(url, body).await.unwrap();

        let got = m.read_orig(url).await.expect("cache entry");
        assert_eq!(&got[..], body);
    }

    #[tokio::test]
    async fn meta_round_trip() {
        let (_dir, m) = manager(Duration::from_secs(3600));
        m.ensure_dirs().await.unwrap();

        let url = "https://example.com/favicon.ico";
        let meta = OrigMeta {
            url: url.to_string(),
            etag: "\"abc\"".to_string(),
            last_modified: "Mon, 01 Jan 2024 00:00:00 GMT".to_string(),
            updated_at: 1_700_000_000,
        };
        m.write_orig_meta(url, &meta).await.unwrap();

        let got = m.read_orig_meta(url).await.expect("meta entry");
        assert_eq!(got.etag, meta.etag);
        assert_eq!(got.last_modified, meta.last_modified);
        assert!(got.has_validators());
    }

    #[tokio::test]
    async fn expired_entries_read_as_miss() {
        let (_dir, m) = manager(Duration::from_millis(30));
        m.ensure_dirs().await.unwrap();

        let url = "https://example.com/favicon.ico";
        m.write_orig(url, b"data").await.unwrap();
        assert!(m.read_orig(url).await.is_some());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(m.read_orig(url).await.is_none(), "entry should have expired");
        // The file itself is still on disk; deletion is the janitor's job.
        assert!(m.orig_dir().join(format!("{}.bin", Manager::cache_key(url))).exists());
    }

    #[tokio::test]
    async fn derived_round_trip_with_modtime() {
        let (_dir, m) = manager(Duration::from_secs(3600));
        m.ensure_dirs().await.unwrap();

        let url = "https://example.com/favicon.ico";
        m.write_derived(url, 32, "png", b"resized data").await.unwrap();

        let (got, modified) = m.read_derived(url, 32, "png").await.expect("derived entry");
        assert_eq!(&got[..], b"resized data");
        assert!(modified <= SystemTime::now());

        // A different size or format is a different entry.
        assert!(m.read_derived(url, 64, "png").await.is_none());
        assert!(m.read_derived(url, 32, "webp").await.is_none());
    }

    #[tokio::test]
    async fn touch_extends_ttl() {
        let (_dir, m) = manager(Duration::from_millis(120));
        m.ensure_dirs().await.unwrap();

        let url = "https://example.com/favicon.ico";
        m.write_orig(url, b"data").await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        m.touch_orig(url).unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        // 160ms after the write but only 80ms after the touch.
        assert!(m.read_orig(url).await.is_some());
    }

    #[test]
    fn keys_are_hex16_and_url_sensitive() {
        let a = Manager::cache_key("https://example.com/");
        let b = Manager::cache_key("https://example.org/");
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn canonically_equal_urls_share_an_entry() {
        let (_dir, m) = manager(Duration::from_secs(3600));
        m.ensure_dirs().await.unwrap();

        let canon = crate::fetch::canonicalize_url_string("https://Example.COM:443/a?b=2&a=1");
        let same = crate::fetch::canonicalize_url_string("https://example.com/a?a=1&b=2");
        m.write_orig(&canon, b"icon").await.unwrap();
        assert!(m.read_orig(&same).await.is_some());
    }
}
