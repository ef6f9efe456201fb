use std::collections::HashMap;

/// Placeholder zone name used when a region has no explicit zone
/// configuration.
pub const DEFAULT_ZONE: &str = "defaultZone";

/// Client-side configuration: regions, zones and the service URLs under them.
///
/// Loading (files, env, remote sources) is out of scope; callers populate the
/// struct and hand it over.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The region this client lives in.
    pub region: String,
    /// Availability zones per region, in preference order. The first zone of
    /// the local region is treated as the client's own zone.
    pub availability_zones: HashMap<String, Vec<String>>,
    /// Discovery service URLs per zone.
    pub service_urls: HashMap<String, Vec<String>>,
    /// Whether this client fetches the registry at all; required for the
    /// composite bootstrap strategy.
    pub should_fetch_registry: bool,
    /// Zone affinity: prefer same-zone servers (anti-affinity when false).
    pub prefer_same_zone: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            availability_zones: HashMap::new(),
            service_urls: HashMap::new(),
            should_fetch_registry: true,
            prefer_same_zone: true,
        }
    }
}

impl ClientConfig {
    /// Zones configured for a region; empty if none.
    pub fn zones_for(&self, region: &str) -> Vec<String> {
        self.availability_zones.get(region).cloned().unwrap_or_default()
    }

    /// The client's own zone: the first configured zone of the local region.
    pub fn my_zone(&self) -> Option<String> {
        self.zones_for(&self.region)
            .into_iter()
            .find(|z| z.as_str() != DEFAULT_ZONE)
    }

    pub fn urls_for_zone(&self, zone: &str) -> Vec<String> {
        self.service_urls.get(zone).cloned().unwrap_or_default()
    }
}

/// Transport-layer tuning for the client decorator stack and resolvers.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Share the bootstrap resolver for query clients instead of building a
    /// composite query resolver.
    pub use_bootstrap_resolver_for_query: bool,
    /// `"composite"` enables the vip-based bootstrap resolver.
    pub bootstrap_resolver_strategy: Option<String>,
    /// Refresh parallelism hint for background resolution. The async runtime
    /// owns the actual executor; a single resolver runs one refresh at a time.
    pub async_executor_thread_pool_size: usize,
    /// Background endpoint refresh period.
    pub async_resolver_refresh_interval_ms: u64,
    /// Budget for the initial synchronous warm-up resolution.
    pub async_resolver_warm_up_timeout_ms: u64,
    /// Base session duration before a forced reconnect.
    pub sessioned_client_reconnect_interval_seconds: u64,
    /// Fraction of the candidate list at which the quarantine set is cleared.
    pub retryable_client_quarantine_refresh_percentage: f64,
    /// Match instances (and the local node) by IP instead of hostname.
    pub applications_resolver_use_ip: bool,
    /// Logical address of the write cluster, for the composite bootstrap.
    pub write_cluster_vip: Option<String>,
    /// Logical address of the read cluster, for the query resolver.
    pub read_cluster_vip: Option<String>,
    /// Fail client construction when the warm-up resolution comes back empty.
    pub fail_fast_on_init: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            use_bootstrap_resolver_for_query: true,
            bootstrap_resolver_strategy: None,
            async_executor_thread_pool_size: 1,
            async_resolver_refresh_interval_ms: 5 * 60 * 1000,
            async_resolver_warm_up_timeout_ms: 5_000,
            sessioned_client_reconnect_interval_seconds: 20 * 60,
            retryable_client_quarantine_refresh_percentage: 0.66,
            applications_resolver_use_ip: false,
            write_cluster_vip: None,
            read_cluster_vip: None,
            fail_fast_on_init: false,
        }
    }
}

/// Server-side configuration for the response cache and peer reconciliation.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TTL for read-write cache entries, seconds after write.
    pub response_cache_auto_expiration_seconds: u64,
    /// Period of the read-only reconciler tick.
    pub response_cache_update_interval_ms: u64,
    /// Enable the read-only snapshot tier.
    pub use_read_only_response_cache: bool,
    /// Period of peer-node set reconciliation.
    pub peer_nodes_update_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            response_cache_auto_expiration_seconds: 180,
            response_cache_update_interval_ms: 30_000,
            use_read_only_response_cache: true,
            peer_nodes_update_interval_ms: 10 * 60 * 1000,
        }
    }
}
