//! End-to-end tests for the resolver hierarchy and decorator stack,
//! exercising the public crate API against a scripted wire transport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use beacon_client::resolver::{AsyncResolver, ClusterResolver, ConfigResolver, ZoneAffinityResolver};
use beacon_client::stack::{canonical_client_factory_with_dns, default_bootstrap_resolver};
use beacon_client::transport::DnsResolver;
use beacon_common::{
    ClientConfig, DiscoveryError, Endpoint, Request, Response, Result, TransportClient,
    TransportConfig, TransportFactory,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A wire transport whose per-host responses are scripted up front.
struct ScriptedTransport {
    responses: Mutex<HashMap<String, Vec<Result<Response>>>>,
    executions: AtomicUsize,
    created: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(HashMap::new()),
            executions: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
        })
    }

    fn script(&self, host: &str, response: Result<Response>) {
        self.responses.lock().unwrap().entry(host.to_string()).or_default().push(response);
    }
}

struct ScriptedClient {
    host: String,
    transport: Arc<ScriptedTransport>,
}

#[async_trait]
impl TransportClient for ScriptedClient {
    async fn execute(&self, _request: &Request) -> Result<Response> {
        self.transport.executions.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.transport.responses.lock().unwrap();
        match responses.get_mut(&self.host).filter(|q| !q.is_empty()) {
            Some(queue) => queue.remove(0),
            None => Err(DiscoveryError::Transport(format!("connection refused by {}", self.host))),
        }
    }

    async fn shutdown(&self) {}
}

struct ScriptedFactory(Arc<ScriptedTransport>);

impl TransportFactory for ScriptedFactory {
    fn create(&self, endpoint: &Endpoint) -> Arc<dyn TransportClient> {
        self.0.created.lock().unwrap().push(endpoint.host.clone());
        Arc::new(ScriptedClient { host: endpoint.host.clone(), transport: self.0.clone() })
    }
}

struct FixedDns;

#[async_trait]
impl DnsResolver for FixedDns {
    async fn resolve_ip(&self, host: &str) -> Result<String> {
        Ok(format!("ip-of-{}", host))
    }
}

fn client_config(zone_urls: &[(&str, &[&str])]) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.availability_zones.insert(
        config.region.clone(),
        zone_urls.iter().map(|(z, _)| z.to_string()).collect(),
    );
    for (zone, urls) in zone_urls {
        config
            .service_urls
            .insert(zone.to_string(), urls.iter().map(|u| u.to_string()).collect());
    }
    config
}

fn get_request() -> Request {
    Request::GetApplications { regions: vec![] }
}

#[tokio::test]
async fn test_resolver_hierarchy_orders_local_zone_first() -> anyhow::Result<()> {
    init_tracing();
    let config = client_config(&[
        ("us-east-1a", &["http://local-1:8080/v2/", "http://local-2:8080/v2/"]),
        ("us-east-1b", &["http://remote-1:8080/v2/"]),
    ]);
    let my_zone = config.my_zone();
    let affinity = Arc::new(ZoneAffinityResolver::new(
        Arc::new(ConfigResolver::new(config)),
        my_zone,
        true,
    ));
    let resolver = AsyncResolver::new("bootstrap", affinity, &TransportConfig::default(), true).await?;

    let endpoints = resolver.endpoints().await;
    assert_eq!(endpoints.len(), 3);
    assert_eq!(endpoints[0].zone.as_deref(), Some("us-east-1a"));
    assert_eq!(endpoints[1].zone.as_deref(), Some("us-east-1a"));
    assert_eq!(endpoints[2].zone.as_deref(), Some("us-east-1b"));
    resolver.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_full_stack_retries_across_cluster_until_success() -> anyhow::Result<()> {
    init_tracing();
    // Three servers in one zone; the stack walks them in resolver order.
    let transport = ScriptedTransport::new();
    let config = client_config(&[(
        "us-east-1a",
        &["http://a:8080/v2/", "http://b:8080/v2/", "http://c:8080/v2/"],
    )]);
    let resolver = default_bootstrap_resolver(&config, &TransportConfig::default()).await?;
    let order: Vec<String> = resolver.endpoints().await.iter().map(|e| e.host.clone()).collect();

    // First two candidates fail (one 500, one transport error), third wins.
    transport.script(&order[0], Ok(Response::with_status(500)));
    transport.script(&order[2], Ok(Response::with_status(200)));

    let client = canonical_client_factory_with_dns(
        "query",
        &TransportConfig::default(),
        resolver.clone(),
        Arc::new(ScriptedFactory(transport.clone())),
        Arc::new(FixedDns),
    );

    let response = client.execute(&get_request()).await?;
    assert_eq!(response.status, 200);
    assert_eq!(transport.executions.load(Ordering::SeqCst), 3);

    client.shutdown().await;
    resolver.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_full_stack_follows_redirects() -> anyhow::Result<()> {
    init_tracing();
    let transport = ScriptedTransport::new();
    let config = client_config(&[("us-east-1a", &["http://lb:8080/v2/"])]);
    let resolver = default_bootstrap_resolver(&config, &TransportConfig::default()).await?;

    transport.script("lb", Ok(Response::redirect(302, "http://lb/v2/apps")));
    transport.script("ip-of-lb", Ok(Response::with_status(200)));

    let client = canonical_client_factory_with_dns(
        "query",
        &TransportConfig::default(),
        resolver.clone(),
        Arc::new(ScriptedFactory(transport.clone())),
        Arc::new(FixedDns),
    );

    let response = client.execute(&get_request()).await?;
    assert_eq!(response.status, 200);
    let created = transport.created.lock().unwrap().clone();
    assert_eq!(created, vec!["lb".to_string(), "ip-of-lb".to_string()]);

    client.shutdown().await;
    resolver.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_full_stack_exhausts_retries() -> anyhow::Result<()> {
    init_tracing();
    let transport = ScriptedTransport::new();
    let config = client_config(&[(
        "us-east-1a",
        &["http://a:8080/v2/", "http://b:8080/v2/", "http://c:8080/v2/", "http://d:8080/v2/"],
    )]);
    let resolver = default_bootstrap_resolver(&config, &TransportConfig::default()).await?;
    // Nothing scripted: every server refuses the connection.

    let client = canonical_client_factory_with_dns(
        "query",
        &TransportConfig::default(),
        resolver.clone(),
        Arc::new(ScriptedFactory(transport.clone())),
        Arc::new(FixedDns),
    );

    let err = client.execute(&get_request()).await.unwrap_err();
    assert!(matches!(err, DiscoveryError::RetryLimitExceeded));
    // Three attempts, one endpoint each.
    assert_eq!(transport.executions.load(Ordering::SeqCst), 3);

    client.shutdown().await;
    resolver.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_empty_configuration_yields_no_reachable_server() -> anyhow::Result<()> {
    init_tracing();
    let transport = ScriptedTransport::new();
    let resolver =
        default_bootstrap_resolver(&ClientConfig::default(), &TransportConfig::default()).await?;

    let client = canonical_client_factory_with_dns(
        "query",
        &TransportConfig::default(),
        resolver.clone(),
        Arc::new(ScriptedFactory(transport.clone())),
        Arc::new(FixedDns),
    );

    let err = client.execute(&get_request()).await.unwrap_err();
    assert!(matches!(err, DiscoveryError::NoReachableServer));
    assert_eq!(transport.executions.load(Ordering::SeqCst), 0);

    client.shutdown().await;
    resolver.shutdown().await;
    Ok(())
}
