//! Request-derived device signal and client address.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::{ACCEPT_ENCODING, ACCEPT_LANGUAGE, USER_AGENT};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use ticketry_core::device::DeviceSignal;

/// Placeholder when no address can be determined.
pub const UNKNOWN_IP: &str = "unknown";

/// Proxy headers consulted for the client address, in priority order.
const FORWARDED_HEADERS: [&str; 4] = [
    "x-forwarded-for",
    "x-real-ip",
    "x-client-ip",
    "cf-connecting-ip",
];

/// Extractor carrying the device signal of the current request.
#[derive(Debug, Clone)]
pub struct ClientInfo(pub DeviceSignal);

impl ClientInfo {
    pub fn ip(&self) -> &str {
        &self.0.ip_address
    }
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientInfo(device_signal(&parts.headers, peer)))
    }
}

pub fn device_signal(headers: &HeaderMap, peer: Option<SocketAddr>) -> DeviceSignal {
    DeviceSignal {
        user_agent: header_str(headers, USER_AGENT.as_str()).unwrap_or_default(),
        accept_language: header_str(headers, ACCEPT_LANGUAGE.as_str()),
        accept_encoding: header_str(headers, ACCEPT_ENCODING.as_str()),
        screen_width: header_str(headers, "x-screen-width"),
        screen_height: header_str(headers, "x-screen-height"),
        ip_address: client_ip(headers, peer),
    }
}

/// First proxy-reported address, else the socket peer, else `"unknown"`.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    FORWARDED_HEADERS
        .iter()
        .filter_map(|name| header_str(headers, name))
        .filter_map(|value| {
            // x-forwarded-for is "client, proxy1, proxy2".
            value
                .split(',')
                .next()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
        .next()
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_IP.to_string())
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn forwarded_for_takes_first_hop() {
        let map = headers(&[
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ("x-real-ip", "198.51.100.2"),
        ]);
        assert_eq!(client_ip(&map, None), "203.0.113.7");
    }

    #[test]
    fn falls_through_header_priority() {
        let map = headers(&[("cf-connecting-ip", "198.51.100.9")]);
        assert_eq!(client_ip(&map, None), "198.51.100.9");
    }

    #[test]
    fn peer_address_then_unknown() {
        let peer: SocketAddr = "192.0.2.1:5555".parse().unwrap();
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer)), "192.0.2.1");
        assert_eq!(client_ip(&HeaderMap::new(), None), UNKNOWN_IP);
    }

    #[test]
    fn signal_reads_device_headers() {
        let map = headers(&[
            ("user-agent", "Mozilla/5.0"),
            ("accept-language", "en-AU,en;q=0.9"),
            ("x-screen-width", "1920"),
            ("x-screen-height", "1080"),
        ]);
        let signal = device_signal(&map, None);
        assert_eq!(signal.user_agent, "Mozilla/5.0");
        assert_eq!(signal.accept_language.as_deref(), Some("en-AU,en;q=0.9"));
        assert_eq!(signal.accept_encoding, None);
        assert_eq!(signal.screen_width.as_deref(), Some("1920"));
        assert_eq!(signal.ip_address, UNKNOWN_IP);
    }
}
