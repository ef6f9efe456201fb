//! Beacon Client
//!
//! This crate provides the client side of the beacon service-discovery
//! platform: the resolver hierarchy that turns configuration into a live,
//! ranked list of server endpoints, and the decorator stack that layers
//! session, retry and redirect semantics over a wire transport primitive.
//!
//! # Architecture
//!
//! Request flow, outermost layer first:
//!
//! 1. **[`SessionedClient`]**: forces full client re-creation at a jittered
//!    interval, so long-lived clients spread across the cluster as its
//!    topology changes
//! 2. **[`RetryableClient`]**: iterates candidate endpoints from the resolver,
//!    quarantining servers that recently failed
//! 3. **[`RedirectingClient`]**: follows 3xx chains and pins to the terminal
//!    endpoint by IP
//! 4. The wire transport (external, plugged in via
//!    [`beacon_common::TransportFactory`])
//!
//! Endpoint supply, leaf first:
//!
//! 1. **[`ConfigResolver`]**: endpoints from static configuration
//! 2. **[`ZoneAffinityResolver`]**: local-zone endpoints first
//! 3. **[`AsyncResolver`]**: cached value with background refresh
//!
//! The [`stack`] module wires the canonical combinations.
//!
//! # Example
//!
//! ```no_run
//! use beacon_client::resolver::{ClusterResolver, ConfigResolver};
//! use beacon_common::ClientConfig;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = ClientConfig::default();
//! let resolver = ConfigResolver::new(config);
//! let endpoints = resolver.endpoints().await;
//! println!("resolved {} endpoints", endpoints.len());
//! # }
//! ```

pub mod resolver;
pub mod stack;
pub mod transport;
pub mod zone_mapper;

pub use resolver::{
    AsyncResolver, ClusterResolver, CompositeResolver, ConfigResolver, ZoneAffinityResolver,
};
pub use stack::canonical_client_factory;
pub use transport::{
    DnsResolver, RedirectingClient, RetryableClient, SessionedClient, StatusEvaluator,
    SystemDnsResolver,
};
pub use zone_mapper::ZoneMapper;
