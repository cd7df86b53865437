//! Endpoint URL validation.
//!
//! Configured endpoints carry credentials (the backend key) and audio, so
//! they must use a TLS scheme and must not point at private addresses. Both
//! checks can be relaxed for local development.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use thiserror::Error;
use tracing::warn;
use url::{Host, Url};

/// Errors that can occur during URL validation
#[derive(Debug, Error)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme must be {expected}, got: {actual}")]
    SchemeNotAllowed { expected: &'static str, actual: String },

    #[error("URL must have a host")]
    MissingHost,

    #[error("URL points at a private/internal address: {0}")]
    PrivateAddress(String),
}

/// The kind of endpoint being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// Plain HTTP request endpoint (`https`, or `http` when insecure)
    Http,
    /// WebSocket endpoint (`wss`, or `ws` when insecure)
    WebSocket,
}

impl EndpointKind {
    fn secure_scheme(&self) -> &'static str {
        match self {
            Self::Http => "https",
            Self::WebSocket => "wss",
        }
    }

    fn insecure_scheme(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::WebSocket => "ws",
        }
    }
}

/// Checks if an IPv4 address is private/internal.
///
/// Covers loopback, RFC 1918, link-local, broadcast, unspecified,
/// documentation, CGNAT (100.64.0.0/10) and benchmarking (198.18.0.0/15).
pub fn is_private_ipv4(ip: &Ipv4Addr) -> bool {
    let octets = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_unspecified()
        || ip.is_documentation()
        || (octets[0] == 100 && (octets[1] & 0xC0) == 64)
        || (octets[0] == 198 && (octets[1] == 18 || octets[1] == 19))
}

/// Checks if an IPv6 address is private/internal.
///
/// Covers loopback, unspecified, link-local (fe80::/10), unique local
/// (fc00::/7), documentation (2001:db8::/32) and IPv4-mapped private ranges.
pub fn is_private_ipv6(ip: &Ipv6Addr) -> bool {
    if let Some(ipv4) = ip.to_ipv4_mapped() {
        return is_private_ipv4(&ipv4);
    }
    let segments = ip.segments();
    ip.is_loopback()
        || ip.is_unspecified()
        || segments[0] & 0xFFC0 == 0xFE80
        || segments[0] & 0xFE00 == 0xFC00
        || (segments[0] == 0x2001 && segments[1] == 0x0DB8)
}

/// Checks if an IP address is private/internal
pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => is_private_ipv4(ipv4),
        IpAddr::V6(ipv6) => is_private_ipv6(ipv6),
    }
}

/// Validate a configured endpoint URL.
///
/// Checks, in order:
/// 1. The URL parses and has a host
/// 2. The scheme is the TLS scheme for `kind` (the plain one is accepted
///    when `allow_insecure` is set)
/// 3. The host is not `localhost` or a raw private IP, unless
///    `allow_insecure` is set
///
/// Hostnames are not resolved.
pub fn validate_endpoint_url(
    url: &str,
    kind: EndpointKind,
    allow_insecure: bool,
) -> Result<Url, UrlValidationError> {
    let parsed = Url::parse(url)?;

    let scheme = parsed.scheme();
    let scheme_ok = scheme == kind.secure_scheme()
        || (allow_insecure && scheme == kind.insecure_scheme());
    if !scheme_ok {
        return Err(UrlValidationError::SchemeNotAllowed {
            expected: kind.secure_scheme(),
            actual: scheme.to_string(),
        });
    }

    let host = parsed.host().ok_or(UrlValidationError::MissingHost)?;
    let private = match &host {
        Host::Domain(domain) => {
            let domain = domain.to_ascii_lowercase();
            domain == "localhost" || domain.ends_with(".localhost")
        }
        Host::Ipv4(ip) => is_private_ipv4(ip),
        Host::Ipv6(ip) => is_private_ipv6(ip),
    };

    if private {
        if !allow_insecure {
            return Err(UrlValidationError::PrivateAddress(host.to_string()));
        }
        warn!(url = %parsed, "Endpoint points at a private address (insecure endpoints allowed)");
    }

    Ok(parsed)
}
