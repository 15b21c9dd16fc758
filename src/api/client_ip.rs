//! Client Address Resolution
//!
//! Works out which source address a request should be attributed to when
//! the server sits behind one or more proxies.

use std::net::SocketAddr;

use axum::http::HeaderMap;

/// Proxy headers consulted in order before falling back to the peer address.
const FORWARDING_HEADERS: [&str; 6] = [
    "x-forwarded-for",
    "proxy-client-ip",
    "wl-proxy-client-ip",
    "http_client_ip",
    "http_x_forwarded_for",
    "x-real-ip",
];

const UNKNOWN: &str = "unknown";

/// Returns the address to attribute a request to.
///
/// The first forwarding header holding something other than an empty value
/// or `unknown` wins, then the socket peer. Only the first hop of a
/// comma-separated chain is kept, and IPv6 loopback reads as `127.0.0.1`.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = FORWARDING_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case(UNKNOWN))
            .map(str::to_string)
    });

    let Some(raw) = forwarded.or_else(|| peer.map(|addr| addr.ip().to_string())) else {
        return UNKNOWN.to_string();
    };

    let first = raw.split(',').next().unwrap_or_default().trim();
    match first {
        "0:0:0:0:0:0:0:1" | "::1" => "127.0.0.1".to_string(),
        other => other.to_string(),
    }
}
