use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use tracing::{info, warn};

use beacon_common::{ClientConfig, DiscoveryError, Result, DEFAULT_ZONE};

/// Maps availability zones to the regions that contain them.
///
/// The mapping is rebuilt from configuration for a set of regions to fetch.
/// Regions without any configured zones fall back to a built-in default
/// table; zones that are still unknown at lookup time go through a
/// trailing-character heuristic (`us-east-1a` → `us-east-1`).
pub struct ZoneMapper {
    config: ClientConfig,
    /// Built-in region → zones table, consulted when configuration has none.
    defaults: HashMap<String, Vec<String>>,
    zone_to_region: RwLock<HashMap<String, String>>,
    /// Last configured region list, re-applied by `refresh`. Also serves as
    /// the mutual-exclusion guard for reconfiguration.
    regions_to_fetch: Mutex<Vec<String>>,
}

impl ZoneMapper {
    pub fn new(config: ClientConfig) -> Self {
        let mut defaults = HashMap::new();
        defaults.insert(
            "us-east-1".to_string(),
            vec!["us-east-1a", "us-east-1c", "us-east-1d", "us-east-1e"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        defaults.insert(
            "us-west-1".to_string(),
            vec!["us-west-1a".to_string(), "us-west-1c".to_string()],
        );
        defaults.insert(
            "us-west-2".to_string(),
            vec!["us-west-2a".to_string(), "us-west-2b".to_string(), "us-west-2c".to_string()],
        );
        defaults.insert(
            "eu-west-1".to_string(),
            vec!["eu-west-1a".to_string(), "eu-west-1b".to_string(), "eu-west-1c".to_string()],
        );
        Self {
            config,
            defaults,
            zone_to_region: RwLock::new(HashMap::new()),
            regions_to_fetch: Mutex::new(Vec::new()),
        }
    }

    /// Rebuilds the zone → region map for the given regions. Zones come from
    /// client configuration; a region whose configuration is empty (or only
    /// the `defaultZone` placeholder) uses the built-in defaults, and a
    /// region absent from both fails with `MappingMissing`.
    pub fn configure_regions(&self, regions: &[String]) -> Result<()> {
        let mut guard = self.regions_to_fetch.lock().expect("zone mapper lock poisoned");
        info!(regions = ?regions, "fetching availability zone to region mapping");

        let mut mapping = HashMap::new();
        for region in regions {
            let configured = self.config.zones_for(region);
            let zones = if configured.is_empty()
                || (configured.len() == 1 && configured[0] == DEFAULT_ZONE)
            {
                info!(region = %region, "no availability zone information configured, checking defaults");
                match self.defaults.get(region) {
                    Some(default_zones) => default_zones.clone(),
                    None => return Err(DiscoveryError::MappingMissing(region.clone())),
                }
            } else {
                configured
            };
            for zone in zones {
                mapping.insert(zone, region.clone());
            }
        }

        *self.zone_to_region.write().expect("zone mapper lock poisoned") = mapping;
        *guard = regions.to_vec();
        Ok(())
    }

    /// Region for a zone. Unknown zones go through the trailing-character
    /// heuristic; `None` means "local region".
    pub fn region_for(&self, zone: &str) -> Option<String> {
        let mapping = self.zone_to_region.read().expect("zone mapper lock poisoned");
        if let Some(region) = mapping.get(zone) {
            return Some(region.clone());
        }
        if zone.is_empty() {
            return None;
        }
        let possible = &zone[..zone.len() - 1];
        if mapping.values().any(|r| r.as_str() == possible) {
            Some(possible.to_string())
        } else {
            None
        }
    }

    /// Re-applies the last configured region list.
    pub fn refresh(&self) -> Result<()> {
        let regions = self.regions_to_fetch.lock().expect("zone mapper lock poisoned").clone();
        if regions.is_empty() {
            warn!("no regions configured yet, nothing to refresh");
            return Ok(());
        }
        self.configure_regions(&regions)
    }
}
