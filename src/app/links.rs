//! Turns a granted download into the URL handed to the client.

use crate::domain::model::Asset;
use crate::domain::purchase::Grant;
use crate::error::MarketError;

/// Hosts that already serve as link-shortener gateways; their URLs are never wrapped twice.
const GATEWAY_DOMAINS: &[&str] = &[
    "linkvertise.com",
    "direct-link.net",
    "link-to.net",
    "link-center.net",
    "link-target.net",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkIssuer {
    /// Hand out the stored asset URL as is.
    Direct,
    /// Route the stored URL through a monetised gateway.
    Linkvertise { base_url: String, publisher_id: String },
}

impl LinkIssuer {
    pub fn mode(&self) -> &'static str {
        match self {
            LinkIssuer::Direct => "direct",
            LinkIssuer::Linkvertise { .. } => "linkvertise",
        }
    }

    /// Produces the download URL. The `Grant` argument can only come from a granting decision.
    pub fn issue(&self, asset: &Asset, _grant: &Grant) -> Result<String, MarketError> {
        let url = asset
            .download_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(MarketError::AssetUnavailable)?;

        match self {
            LinkIssuer::Direct => Ok(url.to_string()),
            LinkIssuer::Linkvertise { base_url, publisher_id } => {
                if is_gateway_url(url) {
                    return Ok(url.to_string());
                }
                let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
                Ok(format!(
                    "{}/{}/dynamic?r={}",
                    base_url.trim_end_matches('/'),
                    publisher_id,
                    encoded
                ))
            }
        }
    }
}

/// Matches on the host when the URL parses, otherwise on the raw text.
pub fn is_gateway_url(raw: &str) -> bool {
    match url::Url::parse(raw).ok().and_then(|u| u.host_str().map(str::to_lowercase)) {
        Some(host) => GATEWAY_DOMAINS
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{}", d))),
        None => GATEWAY_DOMAINS.iter().any(|d| raw.contains(d)),
    }
}
