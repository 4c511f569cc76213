//! End-to-end tests against the real router on an ephemeral port.
//!
//! None of these cross the SSRF boundary: every scenario either takes the
//! fallback path or is refused before any outbound connection.

mod common;

use std::sync::atomic::Ordering;

use common::{spawn_service, spawn_service_with, start_counting_origin};

#[tokio::test]
async fn no_url_serves_fallback_at_200() {
    let service = spawn_service().await;

    let resp = reqwest::get(format!("{}/favicons", service.base_url)).await.unwrap();
    assert_eq!(resp.status(), 200);

    let content_type = resp
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("image/"), "got {content_type}");

    assert_eq!(resp.headers().get("vary").unwrap(), "Accept");
    assert!(resp.headers().get("etag").is_some());
    assert!(resp.headers().get("cache-control").is_some());
    assert!(resp.headers().get("surrogate-control").is_some());
    assert!(resp.headers().get("expires").is_some());
    assert!(resp.headers().get("last-modified").is_some());

    let body = resp.bytes().await.unwrap();
    let img = image::load_from_memory(&body).expect("body must be an image");
    assert_eq!((img.width(), img.height()), (32, 32));
}

#[tokio::test]
async fn cache_control_reflects_configured_max_ages() {
    let service = spawn_service_with(|config| {
        config.response.browser_max_age_secs = 1200;
        config.response.cdn_s_maxage_secs = 2400;
    })
    .await;

    let resp = reqwest::get(format!("{}/favicons", service.base_url)).await.unwrap();
    assert_eq!(
        resp.headers().get("cache-control").unwrap(),
        "public, max-age=1200, s-maxage=2400, immutable"
    );
    assert_eq!(resp.headers().get("surrogate-control").unwrap(), "max-age=2400");
}

#[tokio::test]
async fn size_parameter_is_clamped() {
    let service = spawn_service().await;
    let cases = [
        ("8", 16),
        ("512", 256),
        ("64", 64),
        ("garbage", 32),
        ("", 32),
    ];

    for (sz, want) in cases {
        let resp = reqwest::get(format!("{}/favicons?sz={sz}", service.base_url))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200, "sz={sz}");
        let body = resp.bytes().await.unwrap();
        let img = image::load_from_memory(&body).expect("image body");
        assert_eq!((img.width(), img.height()), (want, want), "sz={sz}");
    }
}

#[tokio::test]
async fn blocked_and_malformed_inputs_always_get_an_image() {
    let service = spawn_service().await;
    let inputs = [
        "url=localhost",
        "url=127.0.0.1",
        "url=http://10.0.0.1",
        "url=ftp://example.com",
        "url=http://[::1]/x",
        "url=%20",
        "domain=127.0.0.1",
        "url=http://intranet",
    ];

    for query in inputs {
        let resp = reqwest::get(format!("{}/favicons?{query}", service.base_url))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200, "{query}");
        let content_type = resp
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.starts_with("image/"), "{query}: {content_type}");
        let body = resp.bytes().await.unwrap();
        assert!(image::load_from_memory(&body).is_ok(), "{query}");
    }
}

#[tokio::test]
async fn loopback_origins_are_never_contacted() {
    let service = spawn_service().await;
    let (stub_addr, hits) = start_counting_origin().await;

    let resp = reqwest::get(format!(
        "{}/favicons?url=http://{stub_addr}/icon.png",
        service.base_url
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), 200);

    assert_eq!(
        hits.load(Ordering::SeqCst),
        0,
        "a loopback origin must never see a connection"
    );
}

#[tokio::test]
async fn etag_replay_gets_304_without_body() {
    let service = spawn_service().await;
    let url = format!("{}/favicons", service.base_url);

    let first = reqwest::get(&url).await.unwrap();
    let etag = first
        .headers()
        .get("etag")
        .expect("first response carries an etag")
        .to_str()
        .unwrap()
        .to_string();
    let _ = first.bytes().await.unwrap();

    let client = reqwest::Client::new();
    let second = client
        .get(&url)
        .header("If-None-Match", &etag)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 304);
    assert_eq!(second.headers().get("etag").unwrap().to_str().unwrap(), etag);
    let body = second.bytes().await.unwrap();
    assert!(body.is_empty(), "304 must not carry a body");
}

#[tokio::test]
async fn identical_bodies_share_an_etag() {
    let service = spawn_service().await;
    let url = format!("{}/favicons", service.base_url);

    let a = reqwest::get(&url).await.unwrap();
    let etag_a = a.headers().get("etag").unwrap().to_str().unwrap().to_string();
    let b = reqwest::get(&url).await.unwrap();
    let etag_b = b.headers().get("etag").unwrap().to_str().unwrap().to_string();
    assert_eq!(etag_a, etag_b);
}

#[tokio::test]
async fn etags_can_be_disabled() {
    let service = spawn_service_with(|config| {
        config.response.use_etag = false;
    })
    .await;

    let resp = reqwest::get(format!("{}/favicons", service.base_url)).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().get("etag").is_none());
}

#[tokio::test]
async fn accept_negotiation_picks_webp() {
    let service = spawn_service().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/favicons", service.base_url))
        .header("Accept", "image/webp,image/png,*/*")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("content-type").unwrap(), "image/webp");

    let body = resp.bytes().await.unwrap();
    assert_eq!(&body[0..4], b"RIFF");
}

#[cfg(feature = "avif")]
#[tokio::test]
async fn accept_negotiation_prefers_avif() {
    let service = spawn_service().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/favicons", service.base_url))
        .header("Accept", "image/avif,image/webp,*/*")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("content-type").unwrap(), "image/avif");
}

#[tokio::test]
async fn default_accept_gets_png() {
    let service = spawn_service().await;

    let resp = reqwest::get(format!("{}/favicons", service.base_url)).await.unwrap();
    assert_eq!(resp.headers().get("content-type").unwrap(), "image/png");
    let body = resp.bytes().await.unwrap();
    assert!(body.starts_with(&[0x89, 0x50, 0x4e, 0x47]));
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let service = spawn_service().await;

    let resp = reqwest::get(format!("{}/health", service.base_url)).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), r#"{"status":"ok"}"#);
}

#[tokio::test]
async fn rate_limit_rejects_floods_with_429() {
    let service = spawn_service_with(|config| {
        config.rate_limit.enabled = true;
        config.rate_limit.requests_per_second = 1;
        config.rate_limit.burst_size = 3;
    })
    .await;

    let client = reqwest::Client::new();
    let mut saw_429 = false;
    for _ in 0..10 {
        let resp = client
            .get(format!("{}/health", service.base_url))
            .send()
            .await
            .unwrap();
        if resp.status() == 429 {
            saw_429 = true;
            break;
        }
    }
    assert!(saw_429, "flood should trip the rate limiter");
}
