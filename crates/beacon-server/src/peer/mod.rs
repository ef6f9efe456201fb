//! Peer-node lifecycle.
//!
//! The set of replication peers is recomputed periodically from the service
//! URL configuration and diff-applied: new peers get freshly constructed
//! clients, vanished peers are shut down, and surviving peers keep their node
//! instance. A transient DNS or configuration blip therefore never tears
//! down a still-valid peer.

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use beacon_common::{
    ClientConfig, Endpoint, InstanceInfo, ServerConfig, TransportConfig, TransportFactory,
};

mod node;

pub use node::PeerNode;

struct PeerState {
    nodes: Vec<Arc<PeerNode>>,
    urls: HashSet<String>,
}

struct PeerInner {
    client_config: ClientConfig,
    transport_config: TransportConfig,
    factory: Arc<dyn TransportFactory>,
    my_info: InstanceInfo,
    state: RwLock<PeerState>,
}

/// Manages the lifecycle of the replication peer collection.
pub struct PeerNodeSet {
    inner: Arc<PeerInner>,
    update_interval: Duration,
    reconciler: StdMutex<Option<JoinHandle<()>>>,
}

impl PeerNodeSet {
    pub fn new(
        client_config: ClientConfig,
        transport_config: TransportConfig,
        server_config: &ServerConfig,
        factory: Arc<dyn TransportFactory>,
        my_info: InstanceInfo,
    ) -> Self {
        Self {
            inner: Arc::new(PeerInner {
                client_config,
                transport_config,
                factory,
                my_info,
                state: RwLock::new(PeerState { nodes: Vec::new(), urls: HashSet::new() }),
            }),
            update_interval: Duration::from_millis(server_config.peer_nodes_update_interval_ms),
            reconciler: StdMutex::new(None),
        }
    }

    /// Runs one immediate reconciliation and schedules periodic ones.
    pub async fn start(&self) {
        self.inner.clone().reconcile().await;

        let inner = self.inner.clone();
        let period = self.update_interval;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                inner.clone().reconcile().await;
            }
        });
        *self.reconciler.lock().expect("reconciler lock poisoned") = Some(handle);

        for node in self.peer_nodes().await {
            info!(url = %node.service_url(), "replica node");
        }
    }

    /// Stops the scheduler, swaps the node list out atomically and shuts each
    /// node down.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.reconciler.lock().expect("reconciler lock poisoned").take() {
            handle.abort();
        }
        let removed = {
            let mut state = self.inner.state.write().await;
            state.urls.clear();
            std::mem::take(&mut state.nodes)
        };
        join_all(removed.iter().map(|node| node.shutdown())).await;
    }

    pub async fn peer_nodes(&self) -> Vec<Arc<PeerNode>> {
        self.inner.state.read().await.nodes.clone()
    }

    pub async fn peer_urls(&self) -> HashSet<String> {
        self.inner.state.read().await.urls.clone()
    }
}

impl PeerInner {
    async fn reconcile(self: Arc<Self>) {
        let desired = self.resolve_peer_urls();
        self.update_peer_nodes(desired).await;
    }

    /// Desired peer URLs: the configured service URLs, local zone first, with
    /// this node's own URL filtered out.
    fn resolve_peer_urls(&self) -> Vec<String> {
        let region = &self.client_config.region;
        let mut zones = self.client_config.zones_for(region);
        let my_zone = self.my_info.zone.clone().or_else(|| self.client_config.my_zone());
        if let Some(my_zone) = my_zone.as_deref() {
            if let Some(pos) = zones.iter().position(|z| z.as_str() == my_zone) {
                zones.rotate_left(pos);
            }
        }

        let mut urls = Vec::new();
        for zone in zones {
            for url in self.client_config.urls_for_zone(&zone) {
                let normalized = normalize_peer_url(&url);
                if self.is_my_url(&normalized) {
                    continue;
                }
                if !urls.contains(&normalized) {
                    urls.push(normalized);
                }
            }
        }
        urls
    }

    /// Diff-applies the desired URL list: vanished peers are shut down, new
    /// peers constructed, surviving peers untouched. The node list and URL
    /// set publish together. An empty desired list is rejected outright.
    async fn update_peer_nodes(&self, desired: Vec<String>) {
        if desired.is_empty() {
            warn!("the replica size seems to be empty, check the service URL configuration");
            return;
        }

        let desired_set: HashSet<String> = desired.iter().cloned().collect();
        let (to_shutdown, to_add) = {
            let state = self.state.read().await;
            let to_shutdown: HashSet<String> =
                state.urls.difference(&desired_set).cloned().collect();
            let to_add: Vec<String> = desired
                .iter()
                .filter(|url| !state.urls.contains(*url))
                .cloned()
                .collect();
            (to_shutdown, to_add)
        };
        if to_shutdown.is_empty() && to_add.is_empty() {
            return;
        }

        let mut retired = Vec::new();
        {
            let mut state = self.state.write().await;
            let mut nodes = std::mem::take(&mut state.nodes);

            if !to_shutdown.is_empty() {
                info!(peers = ?to_shutdown, "removing no longer available peer nodes");
                let (keep, remove): (Vec<_>, Vec<_>) = nodes
                    .into_iter()
                    .partition(|node| !to_shutdown.contains(node.service_url()));
                nodes = keep;
                retired = remove;
            }

            if !to_add.is_empty() {
                info!(peers = ?to_add, "adding new peer nodes");
                for url in &to_add {
                    match self.create_peer_node(url) {
                        Some(node) => nodes.push(Arc::new(node)),
                        None => warn!(url = %url, "could not construct peer node"),
                    }
                }
            }

            state.urls = nodes.iter().map(|n| n.service_url().to_string()).collect();
            state.nodes = nodes;
        }

        join_all(retired.iter().map(|node| node.shutdown())).await;
    }

    fn create_peer_node(&self, peer_url: &str) -> Option<PeerNode> {
        let endpoint = Endpoint::from_service_url(peer_url)?;
        let target_host = host_from_url(peer_url).unwrap_or_else(|| "host".to_string());
        let client = self.factory.create(&endpoint);
        debug!(url = %peer_url, host = %target_host, "created replication client");
        Some(PeerNode::new(peer_url, target_host, client))
    }

    /// True when the URL points at this node itself, matched by hostname or,
    /// when configured, by IP.
    fn is_my_url(&self, url: &str) -> bool {
        let Some(host) = host_from_url(url) else {
            return false;
        };
        let me = if self.transport_config.applications_resolver_use_ip {
            &self.my_info.ip_addr
        } else {
            &self.my_info.host_name
        };
        !me.is_empty() && host == *me
    }
}

fn normalize_peer_url(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

fn host_from_url(url: &str) -> Option<String> {
    match Url::parse(url) {
        Ok(parsed) => parsed.host_str().map(String::from),
        Err(e) => {
            warn!(url = %url, error = %e, "cannot parse service URI");
            None
        }
    }
}
