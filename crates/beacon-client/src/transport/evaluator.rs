use std::sync::Arc;

use beacon_common::RequestKind;

/// Classifies a response status as acceptable or retry-on-another-server.
pub trait StatusEvaluator: Send + Sync {
    fn accept(&self, status: u16, kind: RequestKind) -> bool;
}

/// The legacy policy: for read requests only 2xx is acceptable; for write
/// requests (registration, heartbeat, status updates) 4xx is also
/// authoritative, since the client error will not get better on another
/// server. 5xx is never accepted, and 3xx is retried here because redirect
/// handling belongs to the redirect layer below.
pub struct LegacyEvaluator;

impl StatusEvaluator for LegacyEvaluator {
    fn accept(&self, status: u16, kind: RequestKind) -> bool {
        match kind {
            RequestKind::Read => (200..300).contains(&status),
            RequestKind::Write => (200..300).contains(&status) || (400..500).contains(&status),
        }
    }
}

pub fn legacy_evaluator() -> Arc<dyn StatusEvaluator> {
    Arc::new(LegacyEvaluator)
}
