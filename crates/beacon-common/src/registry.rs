use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a registered instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstanceStatus {
    Up,
    Down,
    Starting,
    OutOfService,
    Unknown,
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstanceStatus::Up => "UP",
            InstanceStatus::Down => "DOWN",
            InstanceStatus::Starting => "STARTING",
            InstanceStatus::OutOfService => "OUT_OF_SERVICE",
            InstanceStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// A single registered service instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub app: String,
    pub instance_id: String,
    pub host_name: String,
    pub ip_addr: String,
    pub port: u16,
    pub secure_port: Option<u16>,
    pub status: InstanceStatus,
    /// Comma-separated logical addresses this instance serves.
    pub vip_address: Option<String>,
    pub secure_vip_address: Option<String>,
    pub zone: Option<String>,
}

impl InstanceInfo {
    pub fn new(app: impl Into<String>, instance_id: impl Into<String>, host_name: impl Into<String>) -> Self {
        let host_name = host_name.into();
        Self {
            app: app.into(),
            instance_id: instance_id.into(),
            ip_addr: String::new(),
            host_name,
            port: 8080,
            secure_port: None,
            status: InstanceStatus::Up,
            vip_address: None,
            secure_vip_address: None,
            zone: None,
        }
    }

    pub fn with_ip(mut self, ip_addr: impl Into<String>) -> Self {
        self.ip_addr = ip_addr.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_status(mut self, status: InstanceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_vip(mut self, vip: impl Into<String>) -> Self {
        self.vip_address = Some(vip.into());
        self
    }

    pub fn with_secure_vip(mut self, svip: impl Into<String>) -> Self {
        self.secure_vip_address = Some(svip.into());
        self
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    /// True if `name` appears in the (secure) vip address list. The list is
    /// comma-separated; membership is exact on the split entries.
    pub fn serves_vip(&self, name: &str, secure: bool) -> bool {
        let addresses = if secure { &self.secure_vip_address } else { &self.vip_address };
        match addresses {
            Some(list) => {
                let mut entries: Vec<&str> = list.split(',').map(str::trim).collect();
                entries.sort_unstable();
                entries.binary_search(&name).is_ok()
            }
            None => false,
        }
    }
}

/// A named group of instances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub name: String,
    pub instances: Vec<InstanceInfo>,
}

impl Application {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), instances: Vec::new() }
    }

    pub fn add_instance(&mut self, instance: InstanceInfo) {
        self.instances.push(instance);
    }

    pub fn instance(&self, instance_id: &str) -> Option<&InstanceInfo> {
        self.instances.iter().find(|i| i.instance_id == instance_id)
    }
}

/// The full registry view a server hands to clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applications {
    /// Hash of the instance status counts, used by clients to detect drift
    /// between full and incrementally-assembled views.
    pub apps_hash_code: String,
    pub applications: Vec<Application>,
}

impl Applications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_application(&mut self, application: Application) {
        self.applications.push(application);
    }

    pub fn get(&self, name: &str) -> Option<&Application> {
        self.applications.iter().find(|a| a.name == name)
    }

    pub fn instance_count(&self) -> usize {
        self.applications.iter().map(|a| a.instances.len()).sum()
    }

    /// Computes the reconcile hash: the concatenation of `STATUS_count_`
    /// fragments over all instances, with statuses in sorted order.
    pub fn reconcile_hash_code(&self) -> String {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for application in &self.applications {
            for instance in &application.instances {
                *counts.entry(instance.status.to_string()).or_insert(0) += 1;
            }
        }
        let mut hash = String::new();
        for (status, count) in counts {
            hash.push_str(&format!("{}_{}_", status, count));
        }
        hash
    }

    /// Recomputes and stores the reconcile hash.
    pub fn refresh_hash_code(&mut self) {
        self.apps_hash_code = self.reconcile_hash_code();
    }
}
