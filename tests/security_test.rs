//! SSRF guard behavior through the public API.

use std::net::IpAddr;

use favicond::security::{is_blocked_ip, normalize_url};

#[test]
fn blocklist_membership() {
    let cases = [
        ("127.0.0.1", true),
        ("10.0.0.1", true),
        ("192.168.1.1", true),
        ("172.16.0.1", true),
        ("169.254.169.254", true),
        ("100.64.0.1", true),
        ("224.0.0.1", true),
        ("240.0.0.1", true),
        ("::1", true),
        ("fe80::1", true),
        ("fd00::1", true),
        ("8.8.8.8", false),
        ("1.1.1.1", false),
        ("93.184.216.34", false),
        ("2606:4700:4700::1111", false),
    ];

    for (input, blocked) in cases {
        let ip: IpAddr = input.parse().unwrap();
        assert_eq!(is_blocked_ip(ip), blocked, "is_blocked_ip({input})");
    }
}

#[tokio::test]
async fn normalize_rejects_unsafe_inputs() {
    // (input, expect_error) — only cases that resolve no DNS, so the table
    // stays hermetic.
    let cases = [
        ("localhost", true),
        ("http://localhost", true),
        ("http://LOCALHOST:8080", true),
        ("http://127.0.0.1", true),
        ("http://10.0.0.1", true),
        ("http://[::1]/path", true),
        ("http://169.254.169.254/latest/meta-data/", true),
        ("ftp://example.com", true),
        ("file:///etc/passwd", true),
        ("", true),
        ("intranet-host", true),
        ("http://8.8.8.8/favicon.ico", false),
    ];

    for (input, expect_error) in cases {
        let result = normalize_url(input).await;
        assert_eq!(result.is_err(), expect_error, "normalize_url({input:?}) = {result:?}");
    }
}

#[tokio::test]
async fn normalize_defaults_to_https() {
    let u = normalize_url("8.8.8.8").await.unwrap();
    assert_eq!(u.scheme(), "https");
}
