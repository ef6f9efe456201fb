use std::sync::Arc;

use async_trait::async_trait;

use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::protocol::{Request, Response};

/// The wire transport primitive. Implementations perform the actual HTTP
/// call against the endpoint they were created for; every decorator in the
/// client stack implements the same capability set so the stack composes as
/// a chain of trait objects.
///
/// Shutdown must be idempotent and releases the underlying connection
/// resources. An in-flight call may complete after shutdown (best effort),
/// but no new calls are dispatched.
#[async_trait]
pub trait TransportClient: Send + Sync {
    async fn execute(&self, request: &Request) -> Result<Response>;
    async fn shutdown(&self);
}

/// Creates transport clients bound to a specific endpoint. Shared by
/// reference through the whole decorator stack.
pub trait TransportFactory: Send + Sync {
    fn create(&self, endpoint: &Endpoint) -> Arc<dyn TransportClient>;
}

/// Creates a fully decorated client. The session layer uses this to rebuild
/// the inner stack on every session rollover.
pub trait ClientFactory: Send + Sync {
    fn new_client(&self) -> Arc<dyn TransportClient>;
}
