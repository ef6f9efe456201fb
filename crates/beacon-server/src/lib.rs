//! Beacon Server
//!
//! This crate provides the server side of the beacon service-discovery
//! platform: the peer-aware response cache that answers client queries, and
//! the peer-node set that keeps replication targets in step with a dynamic
//! service URL list.
//!
//! # Architecture
//!
//! - **[`ResponseCache`]**: a two-tier cache over the instance registry. The
//!   read-write tier is size- and TTL-bounded and computes payloads on miss;
//!   the read-only tier is a plain snapshot reconciled from the read-write
//!   tier by a background ticker. Registry changes invalidate read-write
//!   entries only; the reconciler propagates.
//! - **[`PeerNodeSet`]**: periodically recomputes the peer URL set from
//!   configuration and diff-applies it, creating clients for new peers and
//!   shutting down stale ones.
//! - **[`RegistrySource`]**: the seam to the instance registry, treated as an
//!   opaque source of application snapshots and deltas.
//!
//! The platform is AP-biased: peers converge eventually through periodic
//! reconciliation, and the read-only cache tier lags the read-write tier by
//! at most one reconciler period.

pub mod cache;
pub mod codec;
pub mod peer;
pub mod registry;

pub use cache::{CacheKey, ResponseCache, ALL_APPS, ALL_APPS_DELTA};
pub use codec::ServerCodecs;
pub use peer::{PeerNode, PeerNodeSet};
pub use registry::{InMemoryRegistry, RegistrySource};
