//! Cluster endpoint resolution.
//!
//! Resolvers produce an ordered list of server endpoints; list order encodes
//! preference (head = first to try). They compose as a hierarchy: a leaf
//! resolver reads configuration, [`ZoneAffinityResolver`] reorders for
//! locality, and [`AsyncResolver`] caches the result and refreshes it in the
//! background so the request path never blocks on resolution.

use async_trait::async_trait;

use beacon_common::Endpoint;

mod applications;
mod async_resolver;
mod composite;
mod config;
mod remote;
pub mod util;
mod zone_affinity;

pub use applications::{ApplicationsResolver, ApplicationsSource};
pub use async_resolver::AsyncResolver;
pub use composite::CompositeResolver;
pub use config::ConfigResolver;
pub use remote::RemoteVipResolver;
pub use zone_affinity::ZoneAffinityResolver;

/// Produces the current cluster endpoint list.
///
/// Implementations are free to cache; callers assume the call is cheap. An
/// empty result means resolution failed (resolvers do not surface errors,
/// they log and return empty).
#[async_trait]
pub trait ClusterResolver: Send + Sync {
    fn region(&self) -> String;

    async fn endpoints(&self) -> Vec<Endpoint>;

    /// Releases background resources. Default is a no-op; only resolvers
    /// owning schedulers need it.
    async fn shutdown(&self) {}
}
