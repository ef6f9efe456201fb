//! Canonical wiring of resolvers and transport decorators.
//!
//! The shipped combinations: a bootstrap resolver (config-driven, zone
//! ordered, asynchronously refreshed), an optional composite variant that
//! prefers locally-known registry data, and the client factory producing
//! session-over-retry-over-redirect stacks.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use beacon_common::transport::ClientFactory;
use beacon_common::{ClientConfig, Endpoint, Result, TransportClient, TransportConfig, TransportFactory};

use crate::resolver::{
    ApplicationsResolver, ApplicationsSource, AsyncResolver, ClusterResolver, CompositeResolver,
    ConfigResolver, RemoteVipResolver, ZoneAffinityResolver,
};
use crate::transport::{
    legacy_evaluator, DnsResolver, RedirectingClient, RetryableClient, SessionedClient,
    StatusEvaluator, SystemDnsResolver,
};

/// Value of `bootstrap_resolver_strategy` that enables the vip-based
/// composite bootstrap.
pub const COMPOSITE_BOOTSTRAP_STRATEGY: &str = "composite";

/// Wraps every created transport client in a redirect-following layer, so
/// the retry layer above always talks to terminal servers.
struct RedirectingFactory {
    delegate: Arc<dyn TransportFactory>,
    dns: Arc<dyn DnsResolver>,
}

impl TransportFactory for RedirectingFactory {
    fn create(&self, endpoint: &Endpoint) -> Arc<dyn TransportClient> {
        Arc::new(RedirectingClient::new(endpoint.clone(), self.delegate.clone(), self.dns.clone()))
    }
}

/// Builds one retry client per session for the session layer.
struct RetryableClientFactory {
    name: String,
    resolver: Arc<dyn ClusterResolver>,
    factory: Arc<dyn TransportFactory>,
    evaluator: Arc<dyn StatusEvaluator>,
    transport_config: TransportConfig,
}

impl ClientFactory for RetryableClientFactory {
    fn new_client(&self) -> Arc<dyn TransportClient> {
        Arc::new(RetryableClient::new(
            &self.name,
            self.resolver.clone(),
            self.factory.clone(),
            self.evaluator.clone(),
            &self.transport_config,
        ))
    }
}

/// The canonical decorator stack: Sessioned(Retryable(Redirecting(wire))),
/// with the legacy status evaluator.
pub fn canonical_client_factory(
    name: &str,
    transport_config: &TransportConfig,
    resolver: Arc<dyn ClusterResolver>,
    transport_factory: Arc<dyn TransportFactory>,
) -> SessionedClient {
    canonical_client_factory_with_dns(
        name,
        transport_config,
        resolver,
        transport_factory,
        Arc::new(SystemDnsResolver),
    )
}

pub fn canonical_client_factory_with_dns(
    name: &str,
    transport_config: &TransportConfig,
    resolver: Arc<dyn ClusterResolver>,
    transport_factory: Arc<dyn TransportFactory>,
    dns: Arc<dyn DnsResolver>,
) -> SessionedClient {
    let redirecting = Arc::new(RedirectingFactory { delegate: transport_factory, dns });
    let retryable = Arc::new(RetryableClientFactory {
        name: name.to_string(),
        resolver,
        factory: redirecting,
        evaluator: legacy_evaluator(),
        transport_config: transport_config.clone(),
    });
    SessionedClient::new(
        name,
        retryable,
        Duration::from_secs(transport_config.sessioned_client_reconnect_interval_seconds),
    )
}

/// The default bootstrap resolver: static configuration, zone ordered, warmed
/// up and refreshed in the background.
pub async fn default_bootstrap_resolver(
    client_config: &ClientConfig,
    transport_config: &TransportConfig,
) -> Result<Arc<AsyncResolver>> {
    let delegate = Arc::new(ZoneAffinityResolver::new(
        Arc::new(ConfigResolver::new(client_config.clone())),
        client_config.my_zone(),
        client_config.prefer_same_zone,
    ));
    let resolver =
        AsyncResolver::new("bootstrap", delegate, transport_config, transport_config.fail_fast_on_init)
            .await?;
    Ok(Arc::new(resolver))
}

/// The composite bootstrap resolver: endpoints of the write-cluster vip from
/// the locally-known registry, falling through to a vip query against the
/// configured servers.
pub async fn composite_bootstrap_resolver(
    client_config: &ClientConfig,
    transport_config: &TransportConfig,
    transport_factory: Arc<dyn TransportFactory>,
    applications_source: Arc<dyn ApplicationsSource>,
) -> Result<Arc<AsyncResolver>> {
    let Some(vip) = transport_config.write_cluster_vip.clone() else {
        warn!("composite bootstrap requested without a write cluster vip, using the default bootstrap resolver");
        return default_bootstrap_resolver(client_config, transport_config).await;
    };

    let root = Arc::new(ConfigResolver::new(client_config.clone()));
    let remote = Arc::new(RemoteVipResolver::new(
        client_config.clone(),
        transport_config.clone(),
        root,
        transport_factory,
        vip.clone(),
    ));
    let local = Arc::new(ApplicationsResolver::new(
        client_config.clone(),
        transport_config.clone(),
        applications_source,
        vip,
    ));
    let composite = Arc::new(CompositeResolver::new(client_config.region.clone(), local, remote));
    let delegate = Arc::new(ZoneAffinityResolver::new(
        composite,
        client_config.my_zone(),
        client_config.prefer_same_zone,
    ));
    let resolver =
        AsyncResolver::new("bootstrap", delegate, transport_config, transport_config.fail_fast_on_init)
            .await?;
    Ok(Arc::new(resolver))
}

/// Picks the bootstrap resolver per configuration. The composite strategy
/// needs registry fetching; without it the default resolver is used.
pub async fn new_bootstrap_resolver(
    client_config: &ClientConfig,
    transport_config: &TransportConfig,
    transport_factory: Arc<dyn TransportFactory>,
    applications_source: Arc<dyn ApplicationsSource>,
) -> Result<Arc<AsyncResolver>> {
    if transport_config.bootstrap_resolver_strategy.as_deref() == Some(COMPOSITE_BOOTSTRAP_STRATEGY) {
        if client_config.should_fetch_registry {
            return composite_bootstrap_resolver(
                client_config,
                transport_config,
                transport_factory,
                applications_source,
            )
            .await;
        }
        warn!(
            "cannot create a composite bootstrap resolver if registry fetch is disabled; \
             falling back to the default bootstrap resolver"
        );
    }
    default_bootstrap_resolver(client_config, transport_config).await
}

/// Resolver for query clients: the bootstrap resolver when sharing is
/// configured, otherwise a composite over the read-cluster vip.
pub async fn query_client_resolver(
    bootstrap: Arc<dyn ClusterResolver>,
    client_config: &ClientConfig,
    transport_config: &TransportConfig,
    transport_factory: Arc<dyn TransportFactory>,
    applications_source: Arc<dyn ApplicationsSource>,
) -> Result<Arc<dyn ClusterResolver>> {
    if transport_config.use_bootstrap_resolver_for_query {
        return Ok(bootstrap);
    }
    let Some(vip) = transport_config.read_cluster_vip.clone() else {
        warn!("no read cluster vip configured, sharing the bootstrap resolver for queries");
        return Ok(bootstrap);
    };

    let remote = Arc::new(RemoteVipResolver::new(
        client_config.clone(),
        transport_config.clone(),
        bootstrap,
        transport_factory,
        vip.clone(),
    ));
    let local = Arc::new(ApplicationsResolver::new(
        client_config.clone(),
        transport_config.clone(),
        applications_source,
        vip,
    ));
    let composite = Arc::new(CompositeResolver::new(client_config.region.clone(), local, remote));
    let delegate = Arc::new(ZoneAffinityResolver::new(
        composite,
        client_config.my_zone(),
        client_config.prefer_same_zone,
    ));
    let resolver = AsyncResolver::new("query", delegate, transport_config, false).await?;
    Ok(Arc::new(resolver))
}
