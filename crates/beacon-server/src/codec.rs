use serde_json::Value;

use beacon_common::{Application, Applications, DiscoveryError, Result};

use crate::cache::{AcceptLevel, ContentType};

/// Selects the payload encoder for a `(content type, acceptance level)`
/// pair.
///
/// This core ships the JSON pair; XML acceptance maps onto the same encoders
/// so the selection seam stays in place for richer codec sets. The compact
/// level strips per-instance detail down to the fields clients need for
/// routing.
#[derive(Debug, Clone, Default)]
pub struct ServerCodecs;

pub struct Encoder {
    accept: AcceptLevel,
}

impl ServerCodecs {
    pub fn new() -> Self {
        Self
    }

    pub fn encoder(&self, _content: ContentType, accept: AcceptLevel) -> Encoder {
        Encoder { accept }
    }
}

impl Encoder {
    pub fn encode_applications(&self, applications: &Applications) -> Result<String> {
        let value = match self.accept {
            AcceptLevel::Full => serde_json::to_value(applications)?,
            AcceptLevel::Compact => compact_applications(applications)?,
        };
        serde_json::to_string(&value).map_err(DiscoveryError::from)
    }

    pub fn encode_application(&self, application: &Application) -> Result<String> {
        let value = match self.accept {
            AcceptLevel::Full => serde_json::to_value(application)?,
            AcceptLevel::Compact => compact_application(application)?,
        };
        serde_json::to_string(&value).map_err(DiscoveryError::from)
    }
}

fn compact_applications(applications: &Applications) -> Result<Value> {
    let apps: Vec<Value> = applications
        .applications
        .iter()
        .map(compact_application)
        .collect::<Result<_>>()?;
    Ok(serde_json::json!({
        "apps_hash_code": applications.apps_hash_code,
        "applications": apps,
    }))
}

fn compact_application(application: &Application) -> Result<Value> {
    let instances: Vec<Value> = application
        .instances
        .iter()
        .map(|instance| {
            serde_json::json!({
                "instance_id": instance.instance_id,
                "host_name": instance.host_name,
                "port": instance.port,
                "status": instance.status,
                "vip_address": instance.vip_address,
            })
        })
        .collect();
    Ok(serde_json::json!({
        "name": application.name,
        "instances": instances,
    }))
}
