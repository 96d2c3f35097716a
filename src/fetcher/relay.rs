//! Guards for relay mode, where the caller picks the upstream URL

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

use super::{FetchError, Result};

/// Content types a relay may pass through.
const MEDIA_TYPE_PREFIXES: &[&str] = &["video/", "audio/", "image/"];
const OPAQUE_TYPES: &[&str] = &["application/octet-stream", "binary/octet-stream"];

pub fn is_public_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_public_v4(v4),
            None => is_public_v6(v6),
        },
    }
}

fn is_public_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    let shared = a == 100 && (b & 0xc0) == 64; // 100.64.0.0/10
    !(a == 0
        || shared
        || ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_multicast())
}

fn is_public_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    let unique_local = (first & 0xfe00) == 0xfc00;
    let link_local = (first & 0xffc0) == 0xfe80;
    !(ip.is_loopback() || ip.is_unspecified() || ip.is_multicast() || unique_local || link_local)
}

/// Rejects URLs whose host is, or resolves to, a non-public address.
pub async fn ensure_public_host(media_url: &str) -> Result<()> {
    let url = Url::parse(media_url).map_err(|e| FetchError::Http(e.to_string()))?;
    let host = url
        .host()
        .ok_or_else(|| FetchError::ForbiddenHost(media_url.to_string()))?;

    let addresses: Vec<IpAddr> = match &host {
        Host::Ipv4(ip) => vec![IpAddr::V4(*ip)],
        Host::Ipv6(ip) => vec![IpAddr::V6(*ip)],
        Host::Domain(domain) => {
            let port = url.port_or_known_default().unwrap_or(80);
            tokio::net::lookup_host((*domain, port))
                .await
                .map_err(|e| FetchError::Http(format!("cannot resolve {domain}: {e}")))?
                .map(|addr| addr.ip())
                .collect()
        }
    };

    if addresses.is_empty() || addresses.iter().any(|ip| !is_public_ip(*ip)) {
        return Err(FetchError::ForbiddenHost(host.to_string()));
    }
    Ok(())
}

pub fn is_media_content_type(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    MEDIA_TYPE_PREFIXES
        .iter()
        .any(|prefix| essence.starts_with(prefix))
        || OPAQUE_TYPES.contains(&essence.as_str())
}
