use std::sync::Arc;

use async_trait::async_trait;

use beacon_common::Endpoint;

use super::ClusterResolver;

/// Prefers endpoints from a local source, falling through to a remote one
/// when the local source resolves nothing.
pub struct CompositeResolver {
    region: String,
    local: Arc<dyn ClusterResolver>,
    remote: Arc<dyn ClusterResolver>,
}

impl CompositeResolver {
    pub fn new(region: impl Into<String>, local: Arc<dyn ClusterResolver>, remote: Arc<dyn ClusterResolver>) -> Self {
        Self { region: region.into(), local, remote }
    }
}

#[async_trait]
impl ClusterResolver for CompositeResolver {
    fn region(&self) -> String {
        self.region.clone()
    }

    async fn endpoints(&self) -> Vec<Endpoint> {
        let local = self.local.endpoints().await;
        if !local.is_empty() {
            return local;
        }
        self.remote.endpoints().await
    }

    async fn shutdown(&self) {
        self.local.shutdown().await;
        self.remote.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedResolver(Vec<Endpoint>);

    #[async_trait]
    impl ClusterResolver for FixedResolver {
        fn region(&self) -> String {
            "us-east-1".to_string()
        }

        async fn endpoints(&self) -> Vec<Endpoint> {
            self.0.clone()
        }
    }

    fn endpoint(host: &str) -> Endpoint {
        Endpoint::new(host, 8080, false, "/v2/")
    }

    #[tokio::test]
    async fn test_prefers_local() {
        let resolver = CompositeResolver::new(
            "us-east-1",
            Arc::new(FixedResolver(vec![endpoint("local")])),
            Arc::new(FixedResolver(vec![endpoint("remote")])),
        );
        assert_eq!(resolver.endpoints().await, vec![endpoint("local")]);
    }

    #[tokio::test]
    async fn test_falls_through_when_local_empty() {
        let resolver = CompositeResolver::new(
            "us-east-1",
            Arc::new(FixedResolver(vec![])),
            Arc::new(FixedResolver(vec![endpoint("remote")])),
        );
        assert_eq!(resolver.endpoints().await, vec![endpoint("remote")]);
    }

    #[tokio::test]
    async fn test_both_empty_resolves_empty() {
        let resolver = CompositeResolver::new(
            "us-east-1",
            Arc::new(FixedResolver(vec![])),
            Arc::new(FixedResolver(vec![])),
        );
        assert!(resolver.endpoints().await.is_empty());
    }

    #[tokio::test]
    async fn test_region_is_configured_not_delegated() {
        let resolver = CompositeResolver::new(
            "eu-west-1",
            Arc::new(FixedResolver(vec![])),
            Arc::new(FixedResolver(vec![])),
        );
        assert_eq!(resolver.region(), "eu-west-1");
    }
}
