//! Range export/import blueprint document (§6, §4.4).

use serde::{Deserialize, Serialize};

const BLUEPRINT_VERSION: &str = "1.0";

/// A declarative, portable description of a range's networks and VMs,
/// referencing templates and networks by name rather than id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeBlueprint {
    /// Document schema version.
    pub version: String,
    /// Range display name.
    pub name: String,
    /// Range description.
    pub description: Option<String>,
    /// Declared networks.
    pub networks: Vec<BlueprintNetwork>,
    /// Declared VMs.
    pub vms: Vec<BlueprintVm>,
}

impl RangeBlueprint {
    /// Starts a new blueprint at the current schema version.
    #[must_use]
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            version: BLUEPRINT_VERSION.to_string(),
            name: name.into(),
            description,
            networks: Vec::new(),
            vms: Vec::new(),
        }
    }
}

/// One network entry in a [`RangeBlueprint`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueprintNetwork {
    /// Network name, referenced by [`BlueprintVm::network_name`].
    pub name: String,
    /// CIDR.
    pub subnet: String,
    /// Gateway IP.
    pub gateway: String,
    /// Isolation level.
    pub isolation_level: cyroid_common::status::IsolationLevel,
}

/// One VM entry in a [`RangeBlueprint`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueprintVm {
    /// DNS-label hostname.
    pub hostname: String,
    /// Static IP on the referenced network.
    pub ip_address: String,
    /// Name of the network this VM attaches to.
    pub network_name: String,
    /// Name of the template this VM is synthesized from.
    pub template_name: String,
    /// CPU core count.
    pub cpu: u32,
    /// RAM in megabytes.
    pub ram_mb: u32,
    /// Primary disk size in GB.
    pub disk_gb: u32,
    /// UI layout X position.
    pub position_x: i32,
    /// UI layout Y position.
    pub position_y: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let mut blueprint = RangeBlueprint::new("demo", Some("a demo range".to_string()));
        blueprint.networks.push(BlueprintNetwork {
            name: "dmz".to_string(),
            subnet: "10.0.1.0/24".to_string(),
            gateway: "10.0.1.1".to_string(),
            isolation_level: cyroid_common::status::IsolationLevel::Complete,
        });
        blueprint.vms.push(BlueprintVm {
            hostname: "web".to_string(),
            ip_address: "10.0.1.10".to_string(),
            network_name: "dmz".to_string(),
            template_name: "ubuntu-base".to_string(),
            cpu: 1,
            ram_mb: 512,
            disk_gb: 20,
            position_x: 0,
            position_y: 0,
        });

        let json = serde_json::to_string(&blueprint).unwrap();
        let parsed: RangeBlueprint = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.version, "1.0");
        assert_eq!(parsed.networks.len(), 1);
        assert_eq!(parsed.vms[0].hostname, "web");
    }
}
