//! Originating client address resolution.

use axum::http::HeaderMap;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";
pub const X_ENVOY_EXTERNAL_ADDRESS: &str = "x-envoy-external-address";

/// Resolves the originating client address of a request.
///
/// First match wins:
/// 1. first entry of `X-Forwarded-For`, trimmed
/// 2. `X-Real-Ip`, trimmed
/// 3. host part of `remote_addr` when it parses as `host:port`
/// 4. `X-Envoy-External-Address`, possibly empty
pub fn resolve_client_ip(headers: &HeaderMap, remote_addr: Option<&str>) -> String {
    let forwarded = header_str(headers, X_FORWARDED_FOR)
        .split(',')
        .next()
        .unwrap_or_default()
        .trim();
    if !forwarded.is_empty() {
        return forwarded.to_string();
    }

    let real_ip = header_str(headers, X_REAL_IP).trim();
    if !real_ip.is_empty() {
        return real_ip.to_string();
    }

    if let Some(host) = remote_addr.and_then(split_host_port) {
        return host.to_string();
    }

    header_str(headers, X_ENVOY_EXTERNAL_ADDRESS).to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Splits `host:port` or `[ipv6]:port`, returning a non-empty host.
fn split_host_port(addr: &str) -> Option<&str> {
    let addr = addr.trim();
    let host = if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        tail.strip_prefix(':')?;
        host
    } else {
        let (host, _port) = addr.rsplit_once(':')?;
        // Bare IPv6 without brackets is ambiguous.
        if host.contains(':') {
            return None;
        }
        host
    };

    (!host.is_empty()).then_some(host)
}
