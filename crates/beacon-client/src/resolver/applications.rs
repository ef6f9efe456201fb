use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use beacon_common::{Applications, ClientConfig, Endpoint, InstanceStatus, TransportConfig};

use super::ClusterResolver;

/// Supplies the latest locally-known registry snapshot, or `None` when no
/// fresh snapshot is available.
pub trait ApplicationsSource: Send + Sync {
    fn latest(&self) -> Option<Applications>;
}

/// Resolves server endpoints out of the local registry snapshot: every UP
/// instance serving the target vip becomes an endpoint. Instances are
/// addressed by hostname, or by IP when `applications_resolver_use_ip` is
/// set.
pub struct ApplicationsResolver {
    config: ClientConfig,
    transport_config: TransportConfig,
    source: Arc<dyn ApplicationsSource>,
    target_vip: String,
}

impl ApplicationsResolver {
    pub fn new(
        config: ClientConfig,
        transport_config: TransportConfig,
        source: Arc<dyn ApplicationsSource>,
        target_vip: impl Into<String>,
    ) -> Self {
        Self { config, transport_config, source, target_vip: target_vip.into() }
    }
}

/// Derives endpoints for every UP instance serving `target_vip` in the
/// snapshot. Shared with the remote vip resolver, which fetches the snapshot
/// over the wire.
pub(crate) fn endpoints_from_applications(
    applications: &Applications,
    target_vip: &str,
    use_ip: bool,
    region: &str,
) -> Vec<Endpoint> {
    let mut endpoints = Vec::new();
    for application in &applications.applications {
        for instance in &application.instances {
            if instance.status != InstanceStatus::Up {
                continue;
            }
            if !instance.serves_vip(target_vip, false) {
                continue;
            }
            let address = if use_ip { &instance.ip_addr } else { &instance.host_name };
            if address.is_empty() {
                debug!(instance = %instance.instance_id, "skipping instance without a usable address");
                continue;
            }
            endpoints.push(
                Endpoint::new(address.clone(), instance.port, false, "/v2/")
                    .with_placement(Some(region.to_string()), instance.zone.clone()),
            );
        }
    }
    endpoints
}

#[async_trait]
impl ClusterResolver for ApplicationsResolver {
    fn region(&self) -> String {
        self.config.region.clone()
    }

    async fn endpoints(&self) -> Vec<Endpoint> {
        let applications = match self.source.latest() {
            Some(apps) => apps,
            None => return Vec::new(),
        };
        endpoints_from_applications(
            &applications,
            &self.target_vip,
            self.transport_config.applications_resolver_use_ip,
            &self.config.region,
        )
    }
}
