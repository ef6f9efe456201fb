use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use beacon_common::Endpoint;

use super::util;
use super::ClusterResolver;

/// Reorders a delegate's endpoints so that local-zone entries come first.
///
/// Both halves are shuffled with the IP-seeded randomization, so same-zone
/// endpoints stay contiguous while load spreads across hosts. With
/// `affinity = false` the merged list is reversed (anti-affinity).
pub struct ZoneAffinityResolver {
    delegate: Arc<dyn ClusterResolver>,
    my_zone: Option<String>,
    affinity: bool,
}

impl ZoneAffinityResolver {
    pub fn new(delegate: Arc<dyn ClusterResolver>, my_zone: Option<String>, affinity: bool) -> Self {
        Self { delegate, my_zone, affinity }
    }

    fn randomize_and_merge(local: Vec<Endpoint>, other: Vec<Endpoint>) -> Vec<Endpoint> {
        if local.is_empty() {
            return util::randomize(&other);
        }
        if other.is_empty() {
            return util::randomize(&local);
        }
        let mut merged = util::randomize(&local);
        merged.extend(util::randomize(&other));
        merged
    }
}

#[async_trait]
impl ClusterResolver for ZoneAffinityResolver {
    fn region(&self) -> String {
        self.delegate.region()
    }

    async fn endpoints(&self) -> Vec<Endpoint> {
        let (local, other) = util::split_by_zone(&self.delegate.endpoints().await, self.my_zone.as_deref());
        let mut merged = Self::randomize_and_merge(local, other);
        if !self.affinity {
            merged.reverse();
        }
        debug!(zone = ?self.my_zone, count = merged.len(), "resolved zone-ordered endpoints");
        merged
    }

    async fn shutdown(&self) {
        self.delegate.shutdown().await;
    }
}
