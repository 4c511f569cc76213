//! Blocked network ranges for outbound connections.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Check if an IP address falls in a blocked network range.
///
/// Blocked ranges cover loopback (`127.0.0.0/8`, `::1`), RFC 1918 private
/// space (`10/8`, `172.16/12`, `192.168/16`), link-local (`169.254/16`,
/// `fe80::/10`), CGNAT (`100.64/10`), unspecified (`0.0.0.0/8`, `::`),
/// multicast (`224/4`, `ff00::/8`), reserved (`240/4`) and unique-local
/// IPv6 (`fc00::/7`).
pub fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_v4(v4),
        IpAddr::V6(v6) => is_blocked_v6(v6),
    }
}

fn is_blocked_v4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        // 100.64.0.0/10 (CGNAT)
        || (octets[0] == 100 && octets[1] & 0xc0 == 64)
        // 0.0.0.0/8
        || octets[0] == 0
        // 224.0.0.0/4 multicast and 240.0.0.0/4 reserved
        || octets[0] >= 224
}

fn is_blocked_v6(ip: Ipv6Addr) -> bool {
    // v4-mapped addresses take the v4 rules, matching how resolvers report
    // dual-stack answers.
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_blocked_v4(v4);
    }
    let seg = ip.segments();
    ip.is_loopback()
        || ip.is_unspecified()
        // fe80::/10 link-local
        || seg[0] & 0xffc0 == 0xfe80
        // fc00::/7 unique local
        || seg[0] & 0xfe00 == 0xfc00
        // ff00::/8 multicast
        || seg[0] & 0xff00 == 0xff00
}
