use async_trait::async_trait;

use beacon_common::{DiscoveryError, Result};

/// Resolves a hostname to a single IP address. The redirect layer pins
/// clients by IP, so it goes through this seam instead of leaving resolution
/// to the transport.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    async fn resolve_ip(&self, host: &str) -> Result<String>;
}

/// System resolver backed by the runtime's host lookup.
pub struct SystemDnsResolver;

#[async_trait]
impl DnsResolver for SystemDnsResolver {
    async fn resolve_ip(&self, host: &str) -> Result<String> {
        let mut addresses = tokio::net::lookup_host((host, 0)).await?;
        addresses
            .next()
            .map(|addr| addr.ip().to_string())
            .ok_or_else(|| DiscoveryError::Transport(format!("no address records for {}", host)))
    }
}
