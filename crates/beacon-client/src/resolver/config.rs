use async_trait::async_trait;
use tracing::warn;

use beacon_common::{ClientConfig, Endpoint};

use super::ClusterResolver;

/// Leaf resolver: endpoints from static configuration.
///
/// For every zone configured in the local region, each configured service
/// URL becomes an endpoint carrying its region and zone. Output ordering is
/// unspecified; callers wanting locality put a [`super::ZoneAffinityResolver`]
/// on top.
pub struct ConfigResolver {
    config: ClientConfig,
}

impl ConfigResolver {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ClusterResolver for ConfigResolver {
    fn region(&self) -> String {
        self.config.region.clone()
    }

    async fn endpoints(&self) -> Vec<Endpoint> {
        let mut endpoints = Vec::new();
        for zone in self.config.zones_for(&self.config.region) {
            for service_url in self.config.urls_for_zone(&zone) {
                match Endpoint::from_service_url(&service_url) {
                    Some(endpoint) => endpoints.push(endpoint.with_placement(
                        Some(self.config.region.clone()),
                        Some(zone.clone()),
                    )),
                    None => {
                        warn!(url = %service_url, zone = %zone, "skipping unparseable service URL");
                    }
                }
            }
        }
        endpoints
    }
}
