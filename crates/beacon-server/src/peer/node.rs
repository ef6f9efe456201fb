use std::sync::Arc;

use beacon_common::TransportClient;

/// A replication peer: one other server participating in the cluster,
/// reachable through its own transport client.
///
/// Replication traffic itself (batched registers, heartbeats) flows through
/// the client; this type owns the client's lifecycle so the node set can
/// create and retire peers wholesale.
pub struct PeerNode {
    service_url: String,
    target_host: String,
    client: Arc<dyn TransportClient>,
}

impl PeerNode {
    pub fn new(service_url: impl Into<String>, target_host: impl Into<String>, client: Arc<dyn TransportClient>) -> Self {
        Self {
            service_url: service_url.into(),
            target_host: target_host.into(),
            client,
        }
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    pub fn target_host(&self) -> &str {
        &self.target_host
    }

    pub fn client(&self) -> &Arc<dyn TransportClient> {
        &self.client
    }

    pub async fn shutdown(&self) {
        self.client.shutdown().await;
    }
}
