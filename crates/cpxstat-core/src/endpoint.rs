//! Registry base URL parsing and per-route URL construction.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Base URL of a fleet registry, e.g. `http://localhost:5000`.
///
/// Stored without a trailing slash so route paths can be appended directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegistryEndpoint {
    base: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("unsupported registry scheme in {0} (only http:// is supported)")]
    UnsupportedScheme(String),
    #[error("invalid registry URL: {0}")]
    InvalidUrl(String),
}

impl RegistryEndpoint {
    pub fn parse(url: &str) -> Result<Self, EndpointError> {
        let url = url.trim();
        let Some(rest) = url.strip_prefix("http://") else {
            if url.contains("://") {
                return Err(EndpointError::UnsupportedScheme(url.to_string()));
            }
            return Err(EndpointError::InvalidUrl(url.to_string()));
        };

        let authority = rest.split('/').next().unwrap_or_default();
        if authority.is_empty() || authority.contains(['?', '#', '@', ' ']) {
            return Err(EndpointError::InvalidUrl(url.to_string()));
        }
        if let Some((_, port)) = authority.rsplit_once(':') {
            if !authority.ends_with(']') && port.parse::<u16>().is_err() {
                return Err(EndpointError::InvalidUrl(url.to_string()));
            }
        }

        Ok(Self {
            base: url.trim_end_matches('/').to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.base
    }

    /// `GET {base}/servers`: the instance roster.
    pub fn servers_url(&self) -> String {
        format!("{}/servers", self.base)
    }

    /// `GET {base}/{id}`: one instance's stats.
    pub fn instance_url(&self, id: &str) -> String {
        format!("{}/{}", self.base, encode_path_segment(id))
    }
}

impl Default for RegistryEndpoint {
    fn default() -> Self {
        Self {
            base: "http://localhost:5000".to_string(),
        }
    }
}

impl fmt::Display for RegistryEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)
    }
}

impl TryFrom<String> for RegistryEndpoint {
    type Error = EndpointError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RegistryEndpoint> for String {
    fn from(value: RegistryEndpoint) -> Self {
        value.base
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set plus `:`.
fn encode_path_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for b in segment.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b':' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
