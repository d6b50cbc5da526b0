//! Outbound target filter
//!
//! First-line defense against the gateway being pointed at its own network.
//! Hostnames are not resolved, so a public name that resolves to a private
//! address passes this check; callers must not treat it as complete.

use std::net::{Ipv4Addr, Ipv6Addr};

use url::{Host, Url};

/// Reason a target URL was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnsafeTarget {
    /// URL could not be parsed at all
    #[error("target url is not valid: {0}")]
    Malformed(String),

    /// Scheme other than http/https
    #[error("scheme `{0}` is not allowed, use http or https")]
    Scheme(String),

    /// URL without a host component
    #[error("target url has no host")]
    MissingHost,

    /// Hostname that names the local machine or local network
    #[error("host `{0}` points at a local address")]
    LocalHost(String),

    /// Literal address in a loopback, private or link-local range
    #[error("address {0} is in a private or reserved range")]
    PrivateAddress(String),
}

/// Check a target URL, returning the reason it is unsafe
pub fn check_target(url: &Url) -> Result<(), UnsafeTarget> {
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UnsafeTarget::Scheme(other.to_owned())),
    }

    match url.host() {
        None => Err(UnsafeTarget::MissingHost),
        Some(Host::Domain(domain)) => check_domain(domain),
        Some(Host::Ipv4(addr)) => check_ipv4(addr),
        Some(Host::Ipv6(addr)) => check_ipv6(addr),
    }
}

/// Parse and check a raw URL string
pub fn is_safe(raw: &str) -> bool {
    Url::parse(raw)
        .map_err(|e| UnsafeTarget::Malformed(e.to_string()))
        .and_then(|url| check_target(&url))
        .is_ok()
}

fn check_domain(domain: &str) -> Result<(), UnsafeTarget> {
    let host = domain.trim_end_matches('.').to_ascii_lowercase();

    if host.is_empty() {
        return Err(UnsafeTarget::MissingHost);
    }

    if host == "localhost" || host.ends_with(".localhost") || host.ends_with(".local") || host == "0.0.0.0" {
        return Err(UnsafeTarget::LocalHost(host));
    }

    Ok(())
}

fn check_ipv4(addr: Ipv4Addr) -> Result<(), UnsafeTarget> {
    let [a, b, ..] = addr.octets();

    let blocked = a == 127                          // 127.0.0.0/8
        || a == 10                                  // 10.0.0.0/8
        || (a == 172 && (16..=31).contains(&b))     // 172.16.0.0/12
        || (a == 192 && b == 168)                   // 192.168.0.0/16
        || a == 0                                   // 0.0.0.0/8
        || (a == 169 && b == 254); // 169.254.0.0/16

    if blocked {
        Err(UnsafeTarget::PrivateAddress(addr.to_string()))
    } else {
        Ok(())
    }
}

fn check_ipv6(addr: Ipv6Addr) -> Result<(), UnsafeTarget> {
    if let Some(mapped) = addr.to_ipv4_mapped() {
        return check_ipv4(mapped);
    }

    let first = addr.segments()[0];
    let blocked = addr.is_loopback()
        || addr.is_unspecified()
        || (first & 0xfe00) == 0xfc00 // fc00::/7
        || (first & 0xffc0) == 0xfe80; // fe80::/10

    if blocked {
        Err(UnsafeTarget::PrivateAddress(addr.to_string()))
    } else {
        Ok(())
    }
}
