use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use beacon_common::{DiscoveryError, Endpoint, Result, TransportConfig};

use super::util;
use super::ClusterResolver;

struct ResolverState {
    endpoints: Vec<Endpoint>,
    last_refresh_at: Instant,
}

/// Wraps a delegate resolver with a warm-up, a cached value and a periodic
/// background refresh, keeping resolution off the request path.
///
/// A refresh that fails or comes back empty never overwrites the last good
/// value; after a successful warm-up the cached list stays non-empty.
pub struct AsyncResolver {
    name: String,
    delegate: Arc<dyn ClusterResolver>,
    state: Arc<RwLock<ResolverState>>,
    refresh_handle: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncResolver {
    /// Performs one synchronous warm-up resolution (bounded by the configured
    /// warm-up timeout), then schedules the background refresh. An empty
    /// warm-up fails construction when `fail_fast` is set, and is otherwise
    /// accepted with a warning.
    pub async fn new(
        name: &str,
        delegate: Arc<dyn ClusterResolver>,
        transport_config: &TransportConfig,
        fail_fast: bool,
    ) -> Result<Self> {
        let warm_up_budget = Duration::from_millis(transport_config.async_resolver_warm_up_timeout_ms);
        let initial = tokio::time::timeout(warm_up_budget, delegate.endpoints())
            .await
            .unwrap_or_else(|_| {
                warn!(resolver = %name, "warm-up resolution timed out");
                Vec::new()
            });
        if initial.is_empty() {
            if fail_fast {
                return Err(DiscoveryError::InitialResolutionFailed);
            }
            warn!(resolver = %name, "warm-up resolution came back empty, starting with no endpoints");
        }

        let state = Arc::new(RwLock::new(ResolverState {
            endpoints: initial,
            last_refresh_at: Instant::now(),
        }));

        let refresh_handle = Self::spawn_refresh(
            name.to_string(),
            delegate.clone(),
            state.clone(),
            Duration::from_millis(transport_config.async_resolver_refresh_interval_ms),
        );

        Ok(Self {
            name: name.to_string(),
            delegate,
            state,
            refresh_handle: Mutex::new(Some(refresh_handle)),
        })
    }

    fn spawn_refresh(
        name: String,
        delegate: Arc<dyn ClusterResolver>,
        state: Arc<RwLock<ResolverState>>,
        period: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // the warm-up covered the first resolution
            loop {
                interval.tick().await;
                let fresh = delegate.endpoints().await;
                if fresh.is_empty() {
                    warn!(resolver = %name, "background refresh returned no endpoints, keeping last known list");
                    continue;
                }
                let mut state = state.write().await;
                if !util::identical(&fresh, &state.endpoints) {
                    debug!(resolver = %name, count = fresh.len(), "endpoint list updated");
                }
                state.endpoints = fresh;
                state.last_refresh_at = Instant::now();
            }
        })
    }

    pub async fn last_refresh_at(&self) -> Instant {
        self.state.read().await.last_refresh_at
    }
}

#[async_trait]
impl ClusterResolver for AsyncResolver {
    fn region(&self) -> String {
        self.delegate.region()
    }

    async fn endpoints(&self) -> Vec<Endpoint> {
        self.state.read().await.endpoints.clone()
    }

    async fn shutdown(&self) {
        let handle = self.refresh_handle.lock().expect("resolver lock poisoned").take();
        if let Some(handle) = handle {
            handle.abort();
            debug!(resolver = %self.name, "background refresh stopped");
        }
        self.delegate.shutdown().await;
    }
}
