use crate::{UrlError, UrlResult};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

/// Returns true if the address is loopback, private, unspecified or link-local
///
/// IPv4-mapped IPv6 addresses are checked against the IPv4 ranges.
///
/// # Examples
///
/// ```
/// use std::net::IpAddr;
/// use sitelens::url::is_blocked_ip;
///
/// assert!(is_blocked_ip("10.1.2.3".parse::<IpAddr>().unwrap()));
/// assert!(is_blocked_ip("fd00::1".parse::<IpAddr>().unwrap()));
/// assert!(!is_blocked_ip("93.184.216.34".parse::<IpAddr>().unwrap()));
/// ```
pub fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_ipv4(v4),
        IpAddr::V6(v6) => is_blocked_ipv6(v6),
    }
}

fn is_blocked_ipv4(ip: Ipv4Addr) -> bool {
    // is_private covers 10/8, 172.16/12 and 192.168/16
    ip.is_loopback() || ip.is_private() || ip.is_unspecified() || ip.is_link_local()
}

fn is_blocked_ipv6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_blocked_ipv4(v4);
    }

    let first = ip.segments()[0];
    let unique_local = (first & 0xfe00) == 0xfc00;
    let link_local = (first & 0xffc0) == 0xfe80;

    ip.is_loopback() || ip.is_unspecified() || unique_local || link_local
}

/// Returns true if the URL's host names a local or private target
///
/// Only the literal host is inspected; see [`check_resolved_host`] for the
/// DNS-level check.
pub fn is_private_or_local_host(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_lowercase();
            domain == "localhost" || domain.ends_with(".localhost")
        }
        Some(Host::Ipv4(ip)) => is_blocked_ipv4(ip),
        Some(Host::Ipv6(ip)) => is_blocked_ipv6(ip),
        None => false,
    }
}

/// Resolves the URL's host and refuses it if any address is blocked
///
/// Literal IP hosts are checked without a lookup. A failed lookup is not
/// treated as a violation; the request itself will then fail to connect.
pub async fn check_resolved_host(url: &Url) -> UrlResult<()> {
    let host = match url.host() {
        Some(Host::Domain(domain)) => domain.to_string(),
        Some(_) => {
            if is_private_or_local_host(url) {
                return Err(UrlError::PrivateNetwork(url.to_string()));
            }
            return Ok(());
        }
        None => return Err(UrlError::MissingHost),
    };

    let port = url.port_or_known_default().unwrap_or(80);
    let addrs = match tokio::net::lookup_host((host.as_str(), port)).await {
        Ok(addrs) => addrs,
        Err(e) => {
            tracing::debug!(host = %host, error = %e, "DNS lookup failed during host check");
            return Ok(());
        }
    };

    for addr in addrs {
        if is_blocked_ip(addr.ip()) {
            tracing::warn!(host = %host, ip = %addr.ip(), "Host resolves to a blocked address");
            return Err(UrlError::PrivateNetwork(format!("{} ({})", host, addr.ip())));
        }
    }

    Ok(())
}
