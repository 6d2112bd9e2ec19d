//! Client network address extraction.
//!
//! The server runs behind Cloudflare and Fly.io, so the socket peer is usually
//! a proxy. Proxy headers are checked in order of trust before falling back to
//! the peer address.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};

/// Reported when no address can be determined.
pub const UNKNOWN_CLIENT_IP: &str = "unknown";

/// The best-known client address, as text.
///
/// Never rejects; falls back to `"unknown"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

/// Client address from proxy headers.
///
/// Checked in order: `CF-Connecting-IP`, the first `X-Forwarded-For` hop,
/// `X-Real-IP`, `Fly-Client-IP`. Values that do not parse as an IP address are
/// skipped.
#[must_use]
pub fn ip_from_headers(headers: &HeaderMap) -> Option<IpAddr> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    header("cf-connecting-ip")
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
        .or_else(|| {
            header("x-forwarded-for")
                .and_then(|s| s.split(',').next())
                .and_then(|s| s.trim().parse::<IpAddr>().ok())
        })
        .or_else(|| header("x-real-ip").and_then(|s| s.trim().parse::<IpAddr>().ok()))
        .or_else(|| header("fly-client-ip").and_then(|s| s.trim().parse::<IpAddr>().ok()))
}

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = ip_from_headers(&parts.headers).or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|&ConnectInfo(addr)| addr.ip())
        });

        Ok(Self(
            ip.map_or_else(|| UNKNOWN_CLIENT_IP.to_string(), |ip| ip.to_string()),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{HeaderValue, Request};

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_cloudflare_header_wins() {
        let map = headers(&[
            ("x-forwarded-for", "198.51.100.1"),
            ("cf-connecting-ip", "203.0.113.7"),
        ]);
        assert_eq!(ip_from_headers(&map), Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn test_forwarded_for_first_hop() {
        let map = headers(&[("x-forwarded-for", "198.51.100.1, 10.0.0.1, 10.0.0.2")]);
        assert_eq!(ip_from_headers(&map), Some("198.51.100.1".parse().unwrap()));
    }

    #[test]
    fn test_fly_header_last() {
        let map = headers(&[("fly-client-ip", "2001:db8::1")]);
        assert_eq!(ip_from_headers(&map), Some("2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn test_garbage_header_skipped() {
        let map = headers(&[("cf-connecting-ip", "not-an-ip"), ("x-real-ip", "192.0.2.4")]);
        assert_eq!(ip_from_headers(&map), Some("192.0.2.4".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_extractor_falls_back_to_peer_then_unknown() {
        let (mut parts, ()) = Request::builder().body(()).unwrap().into_parts();
        let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ip, UNKNOWN_CLIENT_IP);

        let peer: SocketAddr = "192.0.2.9:51000".parse().unwrap();
        parts.extensions.insert(ConnectInfo(peer));
        let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ip, "192.0.2.9");
    }
}
