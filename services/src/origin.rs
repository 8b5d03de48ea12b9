//! Network-origin comparison for proximity binding.

use std::net::{IpAddr, SocketAddr};

/// Canonical text form of a caller's network origin.
///
/// Accepts a bare address, an `addr:port` / `[v6]:port` socket address, or a
/// forwarded-for list (first hop wins). IPv4-mapped IPv6 addresses collapse to
/// plain IPv4 so `::ffff:10.0.0.7` and `10.0.0.7` compare equal. Anything that
/// does not parse is trimmed and lower-cased.
pub fn normalize_origin(raw: &str) -> String {
    let first = raw.split(',').next().unwrap_or_default().trim();

    let parsed = first
        .parse::<IpAddr>()
        .ok()
        .or_else(|| first.parse::<SocketAddr>().ok().map(|s| s.ip()))
        .or_else(|| {
            first
                .strip_prefix('[')
                .and_then(|s| s.strip_suffix(']'))
                .and_then(|s| s.parse::<IpAddr>().ok())
        });

    match parsed {
        Some(ip) => ip.to_canonical().to_string(),
        None => {
            let lowered = first.to_ascii_lowercase();
            lowered
                .strip_prefix("::ffff:")
                .map(str::to_owned)
                .unwrap_or(lowered)
        }
    }
}

/// Whether two origins name the same network address.
pub fn same_network(a: &str, b: &str) -> bool {
    let (a, b) = (normalize_origin(a), normalize_origin(b));
    !a.is_empty() && a == b
}
