use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::RwLock;

use beacon_common::{Application, Applications, InstanceInfo};

/// The instance registry seam. The registry itself is an external
/// collaborator; the cache only needs snapshots, deltas and single
/// applications out of it.
#[async_trait]
pub trait RegistrySource: Send + Sync {
    async fn applications(&self) -> Applications;

    /// Snapshot spanning the requested remote regions in addition to the
    /// local one.
    async fn applications_from_regions(&self, regions: &[String]) -> Applications;

    /// Incremental change set since the last delta window.
    async fn application_deltas(&self) -> Applications;

    async fn application_deltas_from_regions(&self, regions: &[String]) -> Applications;

    async fn application(&self, name: &str) -> Option<Application>;
}

/// A plain in-memory registry, sufficient for tests, demos and single-node
/// deployments. Registrations and cancellations are recorded into a bounded
/// delta window.
pub struct InMemoryRegistry {
    state: RwLock<RegistryState>,
}

struct RegistryState {
    applications: Applications,
    recent_changes: VecDeque<InstanceInfo>,
}

const MAX_RECENT_CHANGES: usize = 1024;

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState {
                applications: Applications::new(),
                recent_changes: VecDeque::new(),
            }),
        }
    }

    pub async fn register(&self, instance: InstanceInfo) {
        let mut state = self.state.write().await;
        let app_name = instance.app.clone();
        match state.applications.applications.iter_mut().find(|a| a.name == app_name) {
            Some(application) => {
                application.instances.retain(|i| i.instance_id != instance.instance_id);
                application.instances.push(instance.clone());
            }
            None => {
                let mut application = Application::new(app_name);
                application.add_instance(instance.clone());
                state.applications.add_application(application);
            }
        }
        state.applications.refresh_hash_code();
        state.recent_changes.push_back(instance);
        while state.recent_changes.len() > MAX_RECENT_CHANGES {
            state.recent_changes.pop_front();
        }
    }

    pub async fn cancel(&self, app: &str, instance_id: &str) -> bool {
        let mut state = self.state.write().await;
        let mut removed = None;
        if let Some(application) = state.applications.applications.iter_mut().find(|a| a.name == app) {
            if let Some(pos) = application.instances.iter().position(|i| i.instance_id == instance_id) {
                removed = Some(application.instances.remove(pos));
            }
        }
        state.applications.applications.retain(|a| !a.instances.is_empty());
        state.applications.refresh_hash_code();
        if let Some(instance) = removed {
            state.recent_changes.push_back(instance);
            true
        } else {
            false
        }
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistrySource for InMemoryRegistry {
    async fn applications(&self) -> Applications {
        self.state.read().await.applications.clone()
    }

    async fn applications_from_regions(&self, _regions: &[String]) -> Applications {
        // Remote-region registries are an external collaborator; the local
        // snapshot stands in for all regions here.
        self.state.read().await.applications.clone()
    }

    async fn application_deltas(&self) -> Applications {
        let state = self.state.read().await;
        let mut deltas = Applications::new();
        for instance in &state.recent_changes {
            match deltas.applications.iter_mut().find(|a| a.name == instance.app) {
                Some(application) => application.add_instance(instance.clone()),
                None => {
                    let mut application = Application::new(instance.app.clone());
                    application.add_instance(instance.clone());
                    deltas.add_application(application);
                }
            }
        }
        deltas.apps_hash_code = state.applications.reconcile_hash_code();
        deltas
    }

    async fn application_deltas_from_regions(&self, _regions: &[String]) -> Applications {
        self.application_deltas().await
    }

    async fn application(&self, name: &str) -> Option<Application> {
        self.state.read().await.applications.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = InMemoryRegistry::new();
        registry.register(InstanceInfo::new("BILLING", "i-1", "b1.example.net")).await;

        let apps = registry.applications().await;
        assert_eq!(apps.applications.len(), 1);
        assert!(registry.application("BILLING").await.is_some());
        assert!(registry.application("MISSING").await.is_none());
    }

    #[tokio::test]
    async fn test_reregistration_replaces_instance() {
        let registry = InMemoryRegistry::new();
        registry.register(InstanceInfo::new("BILLING", "i-1", "b1.example.net")).await;
        registry.register(InstanceInfo::new("BILLING", "i-1", "b1-new.example.net")).await;

        let app = registry.application("BILLING").await.unwrap();
        assert_eq!(app.instances.len(), 1);
        assert_eq!(app.instances[0].host_name, "b1-new.example.net");
    }

    #[tokio::test]
    async fn test_cancel_removes_empty_application() {
        let registry = InMemoryRegistry::new();
        registry.register(InstanceInfo::new("BILLING", "i-1", "b1.example.net")).await;
        assert!(registry.cancel("BILLING", "i-1").await);
        assert!(!registry.cancel("BILLING", "i-1").await);
        assert!(registry.application("BILLING").await.is_none());
    }

    #[tokio::test]
    async fn test_deltas_accumulate_changes() {
        let registry = InMemoryRegistry::new();
        registry.register(InstanceInfo::new("BILLING", "i-1", "b1.example.net")).await;
        registry.register(InstanceInfo::new("LEDGER", "i-2", "l1.example.net")).await;

        let deltas = registry.application_deltas().await;
        assert_eq!(deltas.applications.len(), 2);
        assert_eq!(deltas.instance_count(), 2);
    }

    #[tokio::test]
    async fn test_hash_code_tracks_registrations() {
        let registry = InMemoryRegistry::new();
        registry.register(InstanceInfo::new("BILLING", "i-1", "b1.example.net")).await;
        let apps = registry.applications().await;
        assert_eq!(apps.apps_hash_code, "UP_1_");
    }
}
