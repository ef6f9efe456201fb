use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use beacon_common::{
    DiscoveryError, Endpoint, Request, Response, Result, TransportClient, TransportFactory,
    TransportConfig,
};

use crate::resolver::ClusterResolver;

use super::{clear_slot_if, shutdown_slot, ClientSlot, StatusEvaluator};

/// Default number of endpoints tried per request.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Retries failed requests on subsequent servers in the cluster.
///
/// Servers that failed recently sit in a quarantine set and are skipped when
/// selecting candidates. The set is pruned to the current candidate list on
/// every request, and cleared entirely once it covers the configured fraction
/// of candidates, at which point there is no choice but to start over.
pub struct RetryableClient {
    name: String,
    resolver: Arc<dyn ClusterResolver>,
    factory: Arc<dyn TransportFactory>,
    evaluator: Arc<dyn StatusEvaluator>,
    max_attempts: usize,
    quarantine_refresh_fraction: f64,
    delegate: ClientSlot,
    quarantine: Mutex<BTreeSet<Endpoint>>,
}

impl RetryableClient {
    pub fn new(
        name: &str,
        resolver: Arc<dyn ClusterResolver>,
        factory: Arc<dyn TransportFactory>,
        evaluator: Arc<dyn StatusEvaluator>,
        transport_config: &TransportConfig,
    ) -> Self {
        Self {
            name: name.to_string(),
            resolver,
            factory,
            evaluator,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            quarantine_refresh_fraction: transport_config.retryable_client_quarantine_refresh_percentage,
            delegate: ClientSlot::default(),
            quarantine: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn quarantine_size(&self) -> usize {
        self.quarantine.lock().expect("quarantine lock poisoned").len()
    }

    /// Current candidates: the resolver list minus quarantined endpoints.
    /// The quarantine is first pruned to the intersection with the list, and
    /// cleared when enough of the cluster is quarantined.
    async fn host_candidates(&self) -> Result<Vec<Endpoint>> {
        let candidates = self.resolver.endpoints().await;
        if candidates.is_empty() {
            return Err(DiscoveryError::NoReachableServer);
        }

        let mut quarantine = self.quarantine.lock().expect("quarantine lock poisoned");
        quarantine.retain(|endpoint| candidates.contains(endpoint));

        let threshold = (candidates.len() as f64 * self.quarantine_refresh_fraction) as usize;
        if quarantine.is_empty() {
            Ok(candidates)
        } else if quarantine.len() >= threshold {
            debug!(client = %self.name, size = quarantine.len(), "clearing quarantined list");
            quarantine.clear();
            Ok(candidates)
        } else {
            Ok(candidates
                .into_iter()
                .filter(|endpoint| !quarantine.contains(endpoint))
                .collect())
        }
    }
}

#[async_trait]
impl TransportClient for RetryableClient {
    async fn execute(&self, request: &Request) -> Result<Response> {
        let mut candidates: Option<Vec<Endpoint>> = None;
        let mut endpoint_idx = 0;

        for attempt in 0..self.max_attempts {
            let mut current = self.delegate.read().await.clone();
            let mut current_endpoint = None;

            if current.is_none() {
                if candidates.is_none() {
                    candidates = Some(self.host_candidates().await?);
                }
                let hosts = candidates.as_ref().expect("candidates populated above");
                if endpoint_idx >= hosts.len() {
                    return Err(DiscoveryError::NoReachableServer);
                }
                let endpoint = hosts[endpoint_idx].clone();
                endpoint_idx += 1;
                current = Some(self.factory.create(&endpoint));
                current_endpoint = Some(endpoint);
            }
            let client = current.expect("client selected above");

            match client.execute(request).await {
                Ok(response) if self.evaluator.accept(response.status, request.kind()) => {
                    *self.delegate.write().await = Some(client);
                    if attempt > 0 {
                        info!(client = %self.name, retry = attempt, "request execution succeeded on retry");
                    }
                    return Ok(response);
                }
                Ok(response) => {
                    warn!(
                        client = %self.name,
                        status = response.status,
                        "request execution failure; retrying on another server if available"
                    );
                }
                Err(e) => {
                    warn!(client = %self.name, error = %e, "request execution failed");
                }
            }

            // Connection error or non-acceptable status: drop the delegate and
            // quarantine the endpoint we just tried.
            clear_slot_if(&self.delegate, &client).await;
            if let Some(endpoint) = current_endpoint {
                self.quarantine.lock().expect("quarantine lock poisoned").insert(endpoint);
            }
        }
        Err(DiscoveryError::RetryLimitExceeded)
    }

    async fn shutdown(&self) {
        shutdown_slot(&self.delegate).await;
    }
}
