//! Cache manager and janitor behavior through the public API.

use std::time::Duration;

use favicond::cache::{Janitor, Manager, OrigMeta};

fn manager(ttl: Duration) -> (tempfile::TempDir, Manager) {
    let dir = tempfile::tempdir().unwrap();
    let m = Manager::new(dir.path(), ttl);
    (dir, m)
}

#[tokio::test]
async fn basic_write_and_read() {
    let (_dir, cm) = manager(Duration::from_secs(3600));
    cm.ensure_dirs().await.unwrap();

    let url = "https://example.com/favicon.ico";
    let data = b"test favicon data";
    cm.write_orig(url, data).await.unwrap();

    let got = cm.read_orig(url).await.expect("read from cache");
    assert_eq!(&got[..], data);
}

#[tokio::test]
async fn meta_write_and_read() {
    let (_dir, cm) = manager(Duration::from_secs(3600));
    cm.ensure_dirs().await.unwrap();

    let url = "https://example.com/favicon.ico";
    let meta = OrigMeta {
        url: url.to_string(),
        etag: "test-etag".to_string(),
        last_modified: "Mon, 01 Jan 2024 00:00:00 GMT".to_string(),
        updated_at: 1_704_067_200,
    };
    cm.write_orig_meta(url, &meta).await.unwrap();

    let got = cm.read_orig_meta(url).await.expect("read meta");
    assert_eq!(got.etag, meta.etag);
    assert_eq!(got.last_modified, meta.last_modified);
}

#[tokio::test]
async fn entries_expire_after_ttl() {
    let (_dir, cm) = manager(Duration::from_millis(20));
    cm.ensure_dirs().await.unwrap();

    let url = "https://example.com/favicon.ico";
    cm.write_orig(url, b"test data").await.unwrap();

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(cm.read_orig(url).await.is_none(), "cache should have expired");
}

#[tokio::test]
async fn resized_variants_round_trip() {
    let (_dir, cm) = manager(Duration::from_secs(3600));
    cm.ensure_dirs().await.unwrap();

    let url = "https://example.com/favicon.ico";
    cm.write_derived(url, 32, "png", b"resized data").await.unwrap();

    let (got, _modified) = cm.read_derived(url, 32, "png").await.expect("read resized");
    assert_eq!(&got[..], b"resized data");
}

#[tokio::test]
async fn layout_directories_are_created() {
    let (dir, cm) = manager(Duration::from_secs(3600));
    cm.ensure_dirs().await.unwrap();
    // Idempotent second call.
    cm.ensure_dirs().await.unwrap();

    for name in ["orig", "resized", "fallback"] {
        assert!(dir.path().join(name).is_dir(), "{name}/ should exist");
    }
}

#[tokio::test]
async fn janitor_enforces_byte_bound() {
    let (dir, cm) = manager(Duration::from_secs(3600));
    cm.ensure_dirs().await.unwrap();

    for i in 0..8 {
        let url = format!("https://example.com/icon-{i}.png");
        cm.write_orig(&url, &vec![0u8; 1024]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(15)).await;
    }

    let bound = 4096;
    Janitor::new(cm.clone(), Duration::from_secs(3600), bound)
        .sweep()
        .await
        .unwrap();

    let total: u64 = std::fs::read_dir(dir.path().join("orig"))
        .unwrap()
        .map(|e| e.unwrap().metadata().unwrap().len())
        .sum();
    assert!(total <= bound, "total {total} exceeds bound {bound}");

    // The newest entry survives the sweep.
    assert!(cm.read_orig("https://example.com/icon-7.png").await.is_some());
}
