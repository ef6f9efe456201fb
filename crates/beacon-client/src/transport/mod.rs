//! The HTTP-client decorator stack.
//!
//! Every layer implements [`beacon_common::TransportClient`] and owns a
//! single delegate slot: a nullable reference to an underlying client that is
//! closed on replacement and on shutdown. Composition is a static stack:
//! session over retry over redirect over the wire transport.

use std::sync::Arc;

use tokio::sync::RwLock;

use beacon_common::TransportClient;

mod dns;
mod evaluator;
mod redirecting;
mod retryable;
mod sessioned;

pub use dns::{DnsResolver, SystemDnsResolver};
pub use evaluator::{legacy_evaluator, LegacyEvaluator, StatusEvaluator};
pub use redirecting::RedirectingClient;
pub use retryable::RetryableClient;
pub use sessioned::SessionedClient;

/// A nullable, swappable reference to an underlying client.
pub(crate) type ClientSlot = RwLock<Option<Arc<dyn TransportClient>>>;

/// Takes the slot's client, if any, and shuts it down.
pub(crate) async fn shutdown_slot(slot: &ClientSlot) {
    let previous = slot.write().await.take();
    if let Some(client) = previous {
        client.shutdown().await;
    }
}

/// Swaps a new client into the slot, shutting down the loser.
pub(crate) async fn swap_slot(slot: &ClientSlot, replacement: Arc<dyn TransportClient>) {
    let previous = slot.write().await.replace(replacement);
    if let Some(client) = previous {
        client.shutdown().await;
    }
}

/// Clears the slot only if it still holds `expected`, mirroring a
/// compare-and-set to null. The caller decides whether to shut the client
/// down afterwards.
pub(crate) async fn clear_slot_if(slot: &ClientSlot, expected: &Arc<dyn TransportClient>) -> bool {
    let mut guard = slot.write().await;
    match guard.as_ref() {
        Some(current) if Arc::ptr_eq(current, expected) => {
            *guard = None;
            true
        }
        _ => false,
    }
}
