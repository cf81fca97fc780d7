//! Quota key derivation.

use super::types::KeyFn;
use crate::{error::ApiError, middleware::auth::AuthUser};
use axum::extract::{ConnectInfo, Request};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// Request extension that lets proxy headers name the client address.
///
/// Only insert it when every request passes through a proxy that overwrites
/// `X-Forwarded-For` and `X-Real-IP`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustProxyHeaders;

/// Resolve the client address.
///
/// With [`TrustProxyHeaders`] present, the first hop of `X-Forwarded-For`
/// wins, then `X-Real-IP`. Header values that are not IP addresses are
/// ignored. Otherwise the socket address is used, then `unknown`.
pub fn client_address(req: &Request) -> String {
    if req.extensions().get::<TrustProxyHeaders>().is_some() {
        let forwarded = header(req, "x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .and_then(parse_ip);
        if let Some(ip) = forwarded.or_else(|| header(req, "x-real-ip").and_then(parse_ip)) {
            return ip.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn parse_ip(value: &str) -> Option<IpAddr> {
    let value = value.trim();
    value
        .parse::<IpAddr>()
        .ok()
        .or_else(|| value.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}

fn header<'a>(req: &'a Request, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Authenticated identity, else the client address.
pub fn caller_identity(req: &Request) -> String {
    req.extensions()
        .get::<AuthUser>()
        .map(|user| user.id.clone())
        .unwrap_or_else(|| client_address(req))
}

/// Key every request by client address.
pub fn by_address() -> KeyFn {
    Arc::new(address_key)
}

/// Key authenticated callers as `identity:<id>`, everyone else by address.
pub fn by_identity_or_address() -> KeyFn {
    Arc::new(identity_key)
}

fn address_key(req: &Request) -> Result<String, ApiError> {
    Ok(client_address(req))
}

fn identity_key(req: &Request) -> Result<String, ApiError> {
    Ok(match req.extensions().get::<AuthUser>() {
        Some(user) => format!("identity:{}", user.id),
        None => client_address(req),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request() -> axum::http::request::Builder {
        Request::builder().uri("/")
    }

    fn behind_proxy(mut req: Request) -> Request {
        req.extensions_mut().insert(TrustProxyHeaders);
        req
    }

    fn with_peer(mut req: Request, addr: &str) -> Request {
        req.extensions_mut().insert(ConnectInfo(addr.parse::<SocketAddr>().unwrap()));
        req
    }

    #[test]
    fn test_forwarded_for_first_hop() {
        let req = request()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_address(&behind_proxy(req)), "203.0.113.7");
    }

    #[test]
    fn test_real_ip_fallback() {
        let req = request()
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_address(&behind_proxy(req)), "198.51.100.2");
    }

    #[test]
    fn test_forwarded_hop_with_port() {
        let req = request()
            .header("x-forwarded-for", "[2001:db8::1]:443")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_address(&behind_proxy(req)), "2001:db8::1");
    }

    #[test]
    fn test_proxy_headers_ignored_unless_trusted() {
        let req = request()
            .header("x-forwarded-for", "203.0.113.7")
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_address(&with_peer(req, "192.0.2.10:40000")), "192.0.2.10");
    }

    #[test]
    fn test_non_ip_header_values_fall_through() {
        let req = request()
            .header("x-forwarded-for", "doc-1")
            .header("x-real-ip", "identity:pat-42")
            .body(Body::empty())
            .unwrap();
        let req = behind_proxy(with_peer(req, "192.0.2.10:40000"));
        assert_eq!(client_address(&req), "192.0.2.10");

        let req = request()
            .header("x-forwarded-for", "doc-1")
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_address(&behind_proxy(req)), "198.51.100.2");
    }

    #[test]
    fn test_unknown_without_any_source() {
        let req = request()
            .header("x-forwarded-for", " ")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_address(&behind_proxy(req)), "unknown");
    }

    #[test]
    fn test_identity_key() {
        let key_fn = by_identity_or_address();

        let mut req = with_peer(request().body(Body::empty()).unwrap(), "203.0.113.7:5000");
        assert_eq!(key_fn(&req).unwrap(), "203.0.113.7");

        req.extensions_mut().insert(AuthUser::new("pat-42", "patient"));
        assert_eq!(key_fn(&req).unwrap(), "identity:pat-42");
        assert_eq!(caller_identity(&req), "pat-42");
    }
}
