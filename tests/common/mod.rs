//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use favicond::cache::{Group, Manager};
use favicond::config::ServiceConfig;
use favicond::fetch::Fetcher;
use favicond::http::{build_router, AppState};

/// A running favicon service bound to an ephemeral port.
pub struct TestService {
    pub base_url: String,
    /// Cache root; dropped with the service.
    pub cache_dir: tempfile::TempDir,
    pub cache: Manager,
}

/// Spawn the service with default configuration.
#[allow(dead_code)]
pub async fn spawn_service() -> TestService {
    spawn_service_with(|_| {}).await
}

/// Spawn the service after letting the caller mutate the configuration.
pub async fn spawn_service_with(mutate: impl FnOnce(&mut ServiceConfig)) -> TestService {
    let cache_dir = tempfile::tempdir().expect("tempdir");
    let mut config = ServiceConfig::default();
    config.cache.root = cache_dir.path().to_string_lossy().into_owned();
    mutate(&mut config);

    let cache = Manager::new(cache_dir.path(), Duration::from_secs(config.cache.ttl_secs));
    cache.ensure_dirs().await.expect("cache dirs");

    let state = AppState {
        fetcher: Fetcher::new().expect("fetcher"),
        cache: cache.clone(),
        fetch_group: Arc::new(Group::new()),
        response: config.response.clone(),
    };

    let router = build_router(&config, state);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let app = router.into_make_service_with_connect_info::<SocketAddr>();
        let _ = axum::serve(listener, app).await;
    });

    TestService {
        base_url: format!("http://{addr}"),
        cache_dir,
        cache,
    }
}

/// Start a stub origin that counts inbound connections and answers every
/// request with a fixed 200. Used to prove that blocked targets are never
/// contacted.
#[allow(dead_code)]
pub async fn start_counting_origin() -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&hits);
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(async move {
                        let body = "ok";
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, hits)
}
