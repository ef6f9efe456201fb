use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use beacon_common::transport::ClientFactory;
use beacon_common::{Request, Response, Result, TransportClient};

/// Enforces a full reconnect at a regular interval (a session), preventing a
/// client from sticking to one particular server forever. This guarantees
/// even load distribution as cluster topology changes, even when no error
/// ever occurs.
///
/// The realized session duration is jittered per session: uniform in
/// `[base/2, 3*base/2)`.
pub struct SessionedClient {
    name: String,
    factory: Arc<dyn ClientFactory>,
    session_duration: Duration,
    rng: StdMutex<StdRng>,
    state: Mutex<SessionState>,
}

struct SessionState {
    client: Option<Arc<dyn TransportClient>>,
    current_session: Duration,
    last_reconnect_at: Instant,
}

impl SessionedClient {
    pub fn new(name: &str, factory: Arc<dyn ClientFactory>, session_duration: Duration) -> Self {
        let mut rng = StdRng::from_entropy();
        let current_session = randomize_session_duration(session_duration, &mut rng);
        Self {
            name: name.to_string(),
            factory,
            session_duration,
            rng: StdMutex::new(rng),
            state: Mutex::new(SessionState {
                client: None,
                current_session,
                last_reconnect_at: Instant::now(),
            }),
        }
    }

    async fn current_client(&self) -> Arc<dyn TransportClient> {
        let mut state = self.state.lock().await;
        if state.last_reconnect_at.elapsed() >= state.current_session {
            debug!(client = %self.name, "ending a session and starting anew");
            state.last_reconnect_at = Instant::now();
            state.current_session = {
                let mut rng = self.rng.lock().expect("session rng poisoned");
                randomize_session_duration(self.session_duration, &mut rng)
            };
            if let Some(old) = state.client.take() {
                old.shutdown().await;
            }
        }
        if state.client.is_none() {
            state.client = Some(self.factory.new_client());
        }
        state.client.clone().expect("client installed above")
    }
}

/// `base + base * (U[0,1) - 0.5)`, i.e. uniform in `[base/2, 3*base/2)`.
fn randomize_session_duration(base: Duration, rng: &mut StdRng) -> Duration {
    let base_ms = base.as_millis() as f64;
    let delta = base_ms * (rng.gen::<f64>() - 0.5);
    Duration::from_millis((base_ms + delta) as u64)
}

#[async_trait]
impl TransportClient for SessionedClient {
    async fn execute(&self, request: &Request) -> Result<Response> {
        let client = self.current_client().await;
        client.execute(request).await
    }

    async fn shutdown(&self) {
        let previous = self.state.lock().await.client.take();
        if let Some(client) = previous {
            client.shutdown().await;
        }
    }
}
