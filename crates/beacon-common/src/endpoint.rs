use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// An addressable discovery-server instance.
///
/// Endpoints carry enough placement information (region, zone) for resolvers
/// to rank them by locality. Two endpoints are equal iff all fields are
/// equal; ordering is by the serialized service URL so endpoints can live in
/// ordered sets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub secure: bool,
    /// URL path prefix, e.g. "/v2/".
    pub relative_uri: String,
    pub region: Option<String>,
    pub zone: Option<String>,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, secure: bool, relative_uri: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            secure,
            relative_uri: relative_uri.into(),
            region: None,
            zone: None,
        }
    }

    pub fn with_placement(mut self, region: Option<String>, zone: Option<String>) -> Self {
        self.region = region;
        self.zone = zone;
        self
    }

    /// Renders `scheme://host:port/relative_uri`.
    pub fn service_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        let path = if self.relative_uri.starts_with('/') {
            self.relative_uri.clone()
        } else {
            format!("/{}", self.relative_uri)
        };
        format!("{}://{}:{}{}", scheme, self.host, self.port, path)
    }

    /// Parses a service URL of the form `scheme://host[:port]/path` back into
    /// an endpoint. Missing ports default to 80/443 by scheme.
    pub fn from_service_url(service_url: &str) -> Option<Self> {
        let url = Url::parse(service_url).ok()?;
        let secure = url.scheme() == "https";
        let host = url.host_str()?.to_string();
        let port = url.port().unwrap_or(if secure { 443 } else { 80 });
        Some(Self::new(host, port, secure, url.path()))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.service_url())?;
        if let Some(zone) = &self.zone {
            write!(f, " (zone {})", zone)?;
        }
        Ok(())
    }
}

impl PartialOrd for Endpoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Endpoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.service_url()
            .cmp(&other.service_url())
            .then_with(|| self.zone.cmp(&other.zone))
            .then_with(|| self.region.cmp(&other.region))
    }
}
