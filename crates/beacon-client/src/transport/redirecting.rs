use std::sync::Arc;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, error, info, warn};
use url::Url;

use beacon_common::{
    DiscoveryError, Endpoint, Request, Response, Result, TransportClient, TransportFactory,
};

use super::{clear_slot_if, shutdown_slot, swap_slot, ClientSlot, DnsResolver};

/// Upper bound on the number of redirect hops followed for one request.
pub const MAX_FOLLOWED_REDIRECTS: usize = 10;

fn redirect_path_regex() -> &'static Regex {
    static REDIRECT_PATH_RE: OnceLock<Regex> = OnceLock::new();
    REDIRECT_PATH_RE.get_or_init(|| Regex::new(r"(.*/v2/)apps(/.*)?$").expect("redirect path regex"))
}

/// Follows 3xx redirect chains and executes subsequent requests against the
/// finally-resolved endpoint.
///
/// The terminal server of a chain is pinned by IP: downstream load balancers
/// may redirect to a specific cluster member, and pinning preserves that
/// choice across requests while avoiding repeated DNS lookups. Any error on
/// the pinned client clears the pin so the next request renegotiates.
pub struct RedirectingClient {
    service_endpoint: Endpoint,
    factory: Arc<dyn TransportFactory>,
    dns: Arc<dyn DnsResolver>,
    pinned: ClientSlot,
}

impl RedirectingClient {
    pub fn new(
        service_endpoint: Endpoint,
        factory: Arc<dyn TransportFactory>,
        dns: Arc<dyn DnsResolver>,
    ) -> Self {
        Self { service_endpoint, factory, dns, pinned: ClientSlot::default() }
    }

    async fn execute_on_new_server(
        &self,
        request: &Request,
        current: &mut Arc<dyn TransportClient>,
    ) -> Result<Response> {
        let mut target: Option<Endpoint> = None;
        for hop in 0..MAX_FOLLOWED_REDIRECTS {
            let response = current.execute(request).await?;
            if !response.is_redirect() {
                if hop == 0 {
                    debug!(endpoint = ?target, "pinning to endpoint");
                } else {
                    info!(endpoint = ?target, hops = hop, "pinning to endpoint after redirects");
                }
                return Ok(response);
            }

            let next = self.redirect_base(response.location.as_deref()).await?;
            current.shutdown().await;
            *current = self.factory.create(&next);
            target = Some(next);
        }
        warn!(service_url = %self.service_endpoint.service_url(), "follow redirect limit crossed");
        Err(DiscoveryError::RedirectLimitExceeded(self.service_endpoint.service_url()))
    }

    /// Parses the Location header into the endpoint to retry against: the
    /// captured path prefix with the host replaced by its resolved IP.
    async fn redirect_base(&self, location: Option<&str>) -> Result<Endpoint> {
        let location = location
            .ok_or_else(|| DiscoveryError::InvalidRedirect("missing Location header in redirect reply".to_string()))?;
        let url = Url::parse(location)
            .map_err(|_| DiscoveryError::InvalidRedirect(location.to_string()))?;
        let captures = redirect_path_regex()
            .captures(url.path())
            .ok_or_else(|| {
                warn!(location = %location, "invalid redirect URL");
                DiscoveryError::InvalidRedirect(location.to_string())
            })?;
        let prefix = captures.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
        let host = url
            .host_str()
            .ok_or_else(|| DiscoveryError::InvalidRedirect(location.to_string()))?;
        let secure = url.scheme() == "https";
        let port = url.port().unwrap_or(if secure { 443 } else { 80 });
        let ip = self.dns.resolve_ip(host).await?;
        Ok(Endpoint::new(ip, port, secure, prefix))
    }
}

#[async_trait]
impl TransportClient for RedirectingClient {
    async fn execute(&self, request: &Request) -> Result<Response> {
        let pinned = self.pinned.read().await.clone();
        match pinned {
            Some(client) => match client.execute(request).await {
                Ok(response) => Ok(response),
                Err(e) => {
                    error!(error = %e, "request execution error, dropping pinned endpoint");
                    clear_slot_if(&self.pinned, &client).await;
                    client.shutdown().await;
                    Err(e)
                }
            },
            None => {
                let mut current = self.factory.create(&self.service_endpoint);
                match self.execute_on_new_server(request, &mut current).await {
                    Ok(response) => {
                        swap_slot(&self.pinned, current).await;
                        Ok(response)
                    }
                    Err(e) => {
                        error!(error = %e, "request execution error");
                        current.shutdown().await;
                        Err(e)
                    }
                }
            }
        }
    }

    async fn shutdown(&self) {
        shutdown_slot(&self.pinned).await;
    }
}
