//! Fluent API for configuring a VM before it is added to a range.

use cyroid_common::error::{CyroidError, Result};
use cyroid_common::ids::{NetworkId, RangeId, TemplateId, VmId};
use cyroid_common::status::VmStatus;
use cyroid_topology::model::{Vm, VmExtendedConfig, VmTemplate};

/// Builder for a [`Vm`] entity, before it is persisted and deployed.
///
/// Resource fields left unset fall back to the template's defaults at
/// [`VmBuilder::build`] time, mirroring how a template acts as a set of
/// overridable defaults rather than a fixed preset (§3).
#[derive(Debug)]
pub struct VmBuilder {
    range_id: RangeId,
    network_id: NetworkId,
    template_id: TemplateId,
    hostname: String,
    ip_address: String,
    cpu_count: Option<u32>,
    ram_mb: Option<u32>,
    disk_gb: Option<u32>,
    extended: VmExtendedConfig,
}

impl VmBuilder {
    /// Starts a new builder for a VM attached to `network_id` within
    /// `range_id`, synthesized from `template_id`.
    #[must_use]
    pub fn new(
        range_id: RangeId,
        network_id: NetworkId,
        template_id: TemplateId,
        hostname: impl Into<String>,
        ip_address: impl Into<String>,
    ) -> Self {
        Self {
            range_id,
            network_id,
            template_id,
            hostname: hostname.into(),
            ip_address: ip_address.into(),
            cpu_count: None,
            ram_mb: None,
            disk_gb: None,
            extended: VmExtendedConfig::default(),
        }
    }

    /// Overrides the template's default CPU core count.
    #[must_use]
    pub const fn cpu_count(mut self, cpu_count: u32) -> Self {
        self.cpu_count = Some(cpu_count);
        self
    }

    /// Overrides the template's default RAM, in megabytes.
    #[must_use]
    pub const fn ram_mb(mut self, ram_mb: u32) -> Self {
        self.ram_mb = Some(ram_mb);
        self
    }

    /// Overrides the template's default primary disk size, in gigabytes.
    #[must_use]
    pub const fn disk_gb(mut self, disk_gb: u32) -> Self {
        self.disk_gb = Some(disk_gb);
        self
    }

    /// Sets the Windows-specific and display-related extended config.
    #[must_use]
    pub fn extended(mut self, extended: VmExtendedConfig) -> Self {
        self.extended = extended;
        self
    }

    /// Builds the VM, applying `template`'s defaults for any unset
    /// resource field and validating the result against §3's resource
    /// bounds before returning it.
    ///
    /// # Errors
    /// Returns [`CyroidError::Validation`] if the resolved CPU/RAM
    /// values fall outside the allowed range.
    pub fn build(self, template: &VmTemplate) -> Result<Vm> {
        let vm = Vm {
            id: VmId::new(),
            range_id: self.range_id,
            network_id: self.network_id,
            template_id: self.template_id,
            hostname: self.hostname,
            ip_address: self.ip_address,
            cpu_count: self.cpu_count.unwrap_or(template.default_cpu),
            ram_mb: self.ram_mb.unwrap_or(template.default_ram_mb),
            disk_gb: self.disk_gb.unwrap_or(template.default_disk_gb),
            status: VmStatus::Pending,
            runtime_handle: None,
            extended: self.extended,
        };

        if !vm.resource_caps_valid() {
            return Err(CyroidError::validation(format!(
                "vm {} resource request out of bounds: {} cpu, {} mb ram",
                vm.hostname, vm.cpu_count, vm.ram_mb
            )));
        }

        Ok(vm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyroid_common::ids::PrincipalId;
    use cyroid_common::status::{OsKind, VmType};

    fn sample_template() -> VmTemplate {
        VmTemplate {
            id: TemplateId::new(),
            name: "ubuntu-desktop".to_string(),
            os_kind: OsKind::Linux,
            linux_distro: None,
            base_image: "ubuntu:22.04".to_string(),
            vm_type: VmType::Container,
            default_cpu: 2,
            default_ram_mb: 2048,
            default_disk_gb: 20,
            post_install_script: None,
            golden_image_path: None,
            cached_iso_path: None,
            tags: vec![],
            owner_id: PrincipalId::new(),
        }
    }

    #[test]
    fn unset_resources_fall_back_to_template_defaults() {
        let template = sample_template();
        let vm = VmBuilder::new(RangeId::new(), NetworkId::new(), template.id, "web", "10.0.1.10")
            .build(&template)
            .unwrap();
        assert_eq!(vm.cpu_count, 2);
        assert_eq!(vm.ram_mb, 2048);
    }

    #[test]
    fn explicit_resources_override_template_defaults() {
        let template = sample_template();
        let vm = VmBuilder::new(RangeId::new(), NetworkId::new(), template.id, "web", "10.0.1.10")
            .cpu_count(4)
            .ram_mb(4096)
            .build(&template)
            .unwrap();
        assert_eq!(vm.cpu_count, 4);
        assert_eq!(vm.ram_mb, 4096);
    }

    #[test]
    fn out_of_bounds_resources_are_rejected() {
        let template = sample_template();
        let result = VmBuilder::new(RangeId::new(), NetworkId::new(), template.id, "web", "10.0.1.10")
            .cpu_count(999)
            .build(&template);
        assert!(result.is_err());
    }
}
