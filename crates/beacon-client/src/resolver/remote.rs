use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use beacon_common::{
    Applications, ClientConfig, Endpoint, Request, TransportConfig, TransportFactory,
};

use super::applications::endpoints_from_applications;
use super::{util, ClusterResolver};

/// Resolves cluster endpoints by asking a server for the instances behind a
/// vip address. The servers to ask come from a delegate resolver (the
/// bootstrap list); the first one that answers wins.
pub struct RemoteVipResolver {
    config: ClientConfig,
    transport_config: TransportConfig,
    delegate: Arc<dyn ClusterResolver>,
    factory: Arc<dyn TransportFactory>,
    target_vip: String,
}

impl RemoteVipResolver {
    pub fn new(
        config: ClientConfig,
        transport_config: TransportConfig,
        delegate: Arc<dyn ClusterResolver>,
        factory: Arc<dyn TransportFactory>,
        target_vip: impl Into<String>,
    ) -> Self {
        Self { config, transport_config, delegate, factory, target_vip: target_vip.into() }
    }
}

#[async_trait]
impl ClusterResolver for RemoteVipResolver {
    fn region(&self) -> String {
        self.config.region.clone()
    }

    async fn endpoints(&self) -> Vec<Endpoint> {
        let servers = util::randomize(&self.delegate.endpoints().await);
        let request = Request::GetVip { vip: self.target_vip.clone() };

        for server in servers {
            let client = self.factory.create(&server);
            let result = client.execute(&request).await;
            client.shutdown().await;

            match result {
                Ok(response) if response.is_success() => {
                    let Some(entity) = response.entity else {
                        warn!(server = %server.host, "vip query returned no entity");
                        continue;
                    };
                    match serde_json::from_value::<Applications>(entity) {
                        Ok(applications) => {
                            return endpoints_from_applications(
                                &applications,
                                &self.target_vip,
                                self.transport_config.applications_resolver_use_ip,
                                &self.config.region,
                            );
                        }
                        Err(e) => {
                            warn!(server = %server.host, error = %e, "could not decode vip query response");
                        }
                    }
                }
                Ok(response) => {
                    warn!(server = %server.host, status = response.status, "vip query rejected");
                }
                Err(e) => {
                    warn!(server = %server.host, error = %e, "vip query failed");
                }
            }
        }
        Vec::new()
    }
}
