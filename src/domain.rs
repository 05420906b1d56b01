use std::fmt;
use std::str::FromStr;

use url::{Host, Url};

use crate::error::Error;

/// The domain being enumerated: ASCII (punycode), lower-cased, no trailing dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetDomain(String);

impl TargetDomain {
    pub fn parse(input: &str) -> Result<Self, Error> {
        let trimmed = input.trim();

        // Accept a pasted URL and keep only its host.
        let host = if trimmed.contains("://") {
            Url::parse(trimmed)
                .ok()
                .and_then(|url| url.host_str().map(str::to_string))
                .ok_or_else(|| Error::InvalidDomain(input.to_string()))?
        } else {
            trimmed.to_string()
        };

        let host = host.trim_end_matches('.');
        if host.is_empty()
            || host
                .chars()
                .any(|c| c.is_whitespace() || c == '/' || c == ':')
        {
            return Err(Error::InvalidDomain(input.to_string()));
        }

        // Internationalized names are compared in their punycode form, the
        // same form the URL parser gives archived hosts.
        let normalized = match Host::parse(host) {
            Ok(Host::Domain(domain)) => domain.to_ascii_lowercase(),
            _ => return Err(Error::InvalidDomain(input.to_string())),
        };

        if normalized.split('.').any(str::is_empty) {
            return Err(Error::InvalidDomain(input.to_string()));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the domain itself and any strict subdomain of it.
    pub fn covers(&self, host: &str) -> bool {
        match host.strip_suffix(self.0.as_str()) {
            Some("") => true,
            Some(prefix) => prefix.ends_with('.') && prefix.len() > 1,
            None => false,
        }
    }
}

impl fmt::Display for TargetDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TargetDomain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Host of `raw_url` if it belongs to `target`, lower-cased with any port dropped.
///
/// Archive indexes contain plenty of junk, so anything that does not parse
/// as a URL is discarded rather than reported.
pub fn extract_subdomain(raw_url: &str, target: &TargetDomain) -> Option<String> {
    let raw_url = raw_url.trim();
    let parsed = if raw_url.contains("://") {
        Url::parse(raw_url)
    } else {
        Url::parse(&format!("http://{}", raw_url))
    }
    .ok()?;

    let host = parsed
        .host_str()?
        .trim_end_matches('.')
        .to_ascii_lowercase();

    if target.covers(&host) {
        Some(host)
    } else {
        None
    }
}
