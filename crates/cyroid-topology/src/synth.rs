//! VM Image Synthesizer (C5): turns `(VM, Template, Network)` into a
//! [`ContainerSpec`], including reverse-proxy labels and golden-image
//! cloning. Pure apart from a KVM-device probe and, when seeding from a
//! golden image, a one-time recursive filesystem copy (§4.5).

use std::collections::HashMap;
use std::path::Path;

use base64::Engine as _;
use cyroid_common::config::CyroidConfig;
use cyroid_common::constants::{VNC_PORT_KASM, VNC_PORT_LINUXSERVER, VNC_PORT_VM_CONSOLE};
use cyroid_common::error::{CyroidError, Result};
use cyroid_common::status::{DisplayMode, VmType};
use cyroid_runtime::ContainerSpec;

use crate::model::{Network, Vm, VmTemplate};

const QEMU_IMAGE: &str = "qemux/qemu";
const DOCKUR_WINDOWS_IMAGE: &str = "dockurr/windows";
const KVM_DEVICE: &str = "/dev/kvm";

/// Container families recognized for reverse-proxy labeling of plain
/// containers, by substring match against the resolved image reference
/// (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DesktopFamily {
    Kasm,
    LinuxServer,
    Default,
}

fn detect_family(image: &str) -> DesktopFamily {
    if image.contains("kasmweb/") {
        DesktopFamily::Kasm
    } else if image.contains("linuxserver/") || image.contains("lscr.io/linuxserver") {
        DesktopFamily::LinuxServer
    } else {
        DesktopFamily::Default
    }
}

/// Synthesizes a [`ContainerSpec`] for `vm`, dispatching on
/// `template.vm_type` to one of C5's three synthesis modes.
///
/// # Errors
/// Returns [`CyroidError::Validation`] if the VM/network/template
/// combination is inconsistent (e.g. the VM's `network_id` does not match
/// `network.id`).
pub fn synthesize(vm: &Vm, template: &VmTemplate, network: &Network, config: &CyroidConfig) -> Result<ContainerSpec> {
    if vm.network_id != network.id {
        return Err(CyroidError::validation(
            "vm.network_id does not match the supplied network",
        ));
    }

    let mut spec = match template.vm_type {
        VmType::Container => synth_plain_container(vm, template),
        VmType::LinuxVm => synth_linux_vm(vm, template, config),
        VmType::WindowsVm => synth_windows_vm(vm, template, config),
    };

    spec.network_id = network.id.to_string();
    spec.ip_address = vm.ip_address.clone();
    spec.cpu_count = vm.cpu_count;
    spec.memory_mb = vm.ram_mb;
    spec.labels.insert("cyroid.range_id".to_string(), vm.range_id.to_string());
    spec.labels.insert("cyroid.vm_id".to_string(), vm.id.to_string());
    spec.labels.insert("cyroid.hostname".to_string(), vm.hostname.clone());

    Ok(spec)
}

/// Resolves the backend port the session multiplexer's VNC proxy (C7)
/// should dial for `vm`, given the template it was synthesized from.
/// Returns `None` for a headless VM (no VNC console to proxy).
#[must_use]
pub fn vnc_backend_port(vm: &Vm, template: &VmTemplate) -> Option<u16> {
    match template.vm_type {
        VmType::LinuxVm | VmType::WindowsVm => Some(VNC_PORT_VM_CONSOLE),
        VmType::Container if vm.extended.display_mode == DisplayMode::Desktop => {
            let (port, ..) = match detect_family(&template.base_image) {
                DesktopFamily::Kasm => (VNC_PORT_KASM, "https", true),
                DesktopFamily::LinuxServer => (VNC_PORT_LINUXSERVER, "http", false),
                DesktopFamily::Default => (VNC_PORT_KASM, "https", false),
            };
            Some(port)
        }
        VmType::Container => None,
    }
}

fn container_name(vm: &Vm) -> String {
    format!("cyroid-{}-{}", vm.hostname, short_id(&vm.id.to_string()))
}

pub(crate) fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

fn synth_plain_container(vm: &Vm, template: &VmTemplate) -> ContainerSpec {
    let mut spec = ContainerSpec::new(container_name(vm), template.base_image.clone());
    spec.hostname = vm.hostname.clone();

    if vm.extended.display_mode == DisplayMode::Desktop {
        apply_desktop_labels(&mut spec, &template.base_image, vm);
    }

    spec
}

fn apply_desktop_labels(spec: &mut ContainerSpec, image: &str, vm: &Vm) {
    let (port, scheme, needs_auth) = match detect_family(image) {
        DesktopFamily::Kasm => (VNC_PORT_KASM, "https", true),
        DesktopFamily::LinuxServer => (VNC_PORT_LINUXSERVER, "http", false),
        DesktopFamily::Default => (VNC_PORT_KASM, "https", false),
    };
    traefik_labels(spec, &vm.id.to_string(), port, scheme, needs_auth);
}

/// Builds the full Traefik label set for a VNC-proxied container (§6,
/// bit-exact label scheme).
fn traefik_labels(spec: &mut ContainerSpec, vm_id: &str, port: u16, scheme: &str, needs_auth: bool) {
    let short = short_id(vm_id);
    let router = format!("vnc-{short}");
    let service = router.clone();
    let strip_middleware = format!("vnc-strip-{short}");
    let path_prefix = format!("/vnc/{vm_id}");

    let mut middlewares = vec![strip_middleware.clone()];
    if needs_auth {
        let auth_middleware = format!("auth-{short}");
        // Placeholder credential pair; a real deployment supplies this via
        // configuration. Documented as a TODO rather than hard-coded prod
        // creds.
        let credential = base64::engine::general_purpose::STANDARD.encode("vnc:changeme");
        spec.labels.insert(
            format!("traefik.http.middlewares.{auth_middleware}.basicauth.users"),
            credential,
        );
        middlewares.push(auth_middleware);
    }
    let middlewares_value = middlewares.join(",");

    spec.labels.insert("traefik.enable".to_string(), "true".to_string());
    spec.labels
        .insert("traefik.docker.network".to_string(), cyroid_common::constants::ROUTING_NETWORK_NAME.to_string());
    spec.labels.insert(
        format!("traefik.http.services.{service}.loadbalancer.server.port"),
        port.to_string(),
    );
    spec.labels.insert(
        format!("traefik.http.services.{service}.loadbalancer.server.scheme"),
        scheme.to_string(),
    );
    spec.labels
        .insert(format!("traefik.http.middlewares.{strip_middleware}.stripprefix.prefixes"), path_prefix.clone());

    for (suffix, entrypoint, tls) in [("", "web", false), ("-secure", "websecure", true)] {
        let name = format!("{router}{suffix}");
        spec.labels.insert(format!("traefik.http.routers.{name}.rule"), format!("PathPrefix(`{path_prefix}`)"));
        spec.labels.insert(format!("traefik.http.routers.{name}.entrypoints"), entrypoint.to_string());
        spec.labels.insert(format!("traefik.http.routers.{name}.service"), service.clone());
        spec.labels.insert(format!("traefik.http.routers.{name}.priority"), "100".to_string());
        spec.labels.insert(format!("traefik.http.routers.{name}.middlewares"), middlewares_value.clone());
        if tls {
            spec.labels.insert(format!("traefik.http.routers.{name}.tls"), "true".to_string());
        }
        if scheme == "https" {
            spec.labels.insert(
                format!("traefik.http.services.{service}.loadbalancer.serversTransport"),
                "insecure-transport@file".to_string(),
            );
        }
    }
}

fn kvm_available() -> bool {
    Path::new(KVM_DEVICE).exists()
}

fn synth_linux_vm(vm: &Vm, template: &VmTemplate, config: &CyroidConfig) -> ContainerSpec {
    let mut spec = ContainerSpec::new(container_name(vm), QEMU_IMAGE.to_string());
    spec.privileged = true;
    spec.hostname = vm.hostname.clone();

    let mut env: HashMap<String, String> = HashMap::new();
    let boot = template
        .linux_distro
        .map(|d| d.code().to_string())
        .or_else(|| vm.extended.iso_source.clone())
        .unwrap_or_default();
    env.insert("BOOT".to_string(), boot);
    env.insert("DISK_SIZE".to_string(), format!("{}G", vm.disk_gb));
    env.insert("CPU_CORES".to_string(), vm.cpu_count.to_string());
    env.insert("RAM_SIZE".to_string(), format!("{}M", vm.ram_mb));
    if let Some(boot_mode) = &vm.extended.boot_mode {
        env.insert("BOOT_MODE".to_string(), boot_mode.clone());
    }
    if let Some(disk_type) = &vm.extended.disk_type {
        env.insert("DISK_TYPE".to_string(), disk_type.clone());
    }
    env.insert(
        "DISPLAY".to_string(),
        if vm.extended.display_mode == DisplayMode::Desktop { "web" } else { "none" }.to_string(),
    );
    if let Some(disk2) = vm.extended.disk2_gb {
        env.insert("DISK2_SIZE".to_string(), format!("{disk2}G"));
    }
    if let Some(disk3) = vm.extended.disk3_gb {
        env.insert("DISK3_SIZE".to_string(), format!("{disk3}G"));
    }
    spec.env = env;

    if kvm_available() {
        spec.devices.push(format!("{KVM_DEVICE}:{KVM_DEVICE}"));
    }

    let storage_path = config.vm_storage_path(vm.range_id, vm.id);
    spec.binds.push(format!("{}:/storage", storage_path.display()));
    if vm.extended.disk2_gb.is_some() {
        if let Some(parent) = storage_path.parent() {
            spec.binds.push(format!("{}/storage2:/storage2", parent.display()));
        }
    }
    if vm.extended.disk3_gb.is_some() {
        if let Some(parent) = storage_path.parent() {
            spec.binds.push(format!("{}/storage3:/storage3", parent.display()));
        }
    }
    if let Some(iso) = &vm.extended.iso_source {
        if Path::new(iso).exists() {
            spec.binds.push(format!("{iso}:/boot.iso:ro"));
        }
    }
    if vm.extended.shared_folder_enabled {
        spec.binds.push(format!("{}/shared:/shared", storage_path.display()));
    }
    if vm.extended.global_shared_enabled {
        spec.binds.push(format!("{}:/global:ro", config.global_shared_dir.display()));
    }

    if vm.extended.display_mode == DisplayMode::Desktop {
        traefik_labels(&mut spec, &vm.id.to_string(), VNC_PORT_VM_CONSOLE, "http", false);
    }

    spec
}

fn synth_windows_vm(vm: &Vm, template: &VmTemplate, config: &CyroidConfig) -> ContainerSpec {
    let mut spec = ContainerSpec::new(container_name(vm), DOCKUR_WINDOWS_IMAGE.to_string());
    spec.privileged = true;
    spec.hostname = vm.hostname.clone();

    let mut env: HashMap<String, String> = HashMap::new();
    if let Some(version) = &vm.extended.iso_source {
        env.insert("VERSION".to_string(), version.clone());
    }
    env.insert("DISK_SIZE".to_string(), format!("{}G", vm.disk_gb));
    env.insert("CPU_CORES".to_string(), vm.cpu_count.to_string());
    env.insert("RAM_SIZE".to_string(), format!("{}M", vm.ram_mb));
    if let Some(username) = &vm.extended.username {
        env.insert("USERNAME".to_string(), username.clone());
    }
    if let Some(password) = &vm.extended.password {
        env.insert("PASSWORD".to_string(), password.clone());
    }
    env.insert("DHCP".to_string(), vm.extended.dhcp.to_string());
    if !vm.extended.dhcp {
        if let Some(gateway) = &vm.extended.static_gateway {
            env.insert("GATEWAY".to_string(), gateway.clone());
        }
        if !vm.extended.static_dns.is_empty() {
            env.insert("DNS".to_string(), vm.extended.static_dns.join(","));
        }
    }
    if let Some(language) = &vm.extended.language {
        env.insert("LANGUAGE".to_string(), language.clone());
    }
    if let Some(keyboard) = &vm.extended.keyboard {
        env.insert("KEYBOARD".to_string(), keyboard.clone());
    }
    if let Some(region) = &vm.extended.region {
        env.insert("REGION".to_string(), region.clone());
    }
    env.insert("MANUAL".to_string(), vm.extended.manual_install.to_string());
    env.insert(
        "BOOT".to_string(),
        template.cached_iso_path.clone().unwrap_or_default(),
    );
    env.insert(
        "DISPLAY".to_string(),
        if vm.extended.display_mode == DisplayMode::Desktop { "web" } else { "none" }.to_string(),
    );
    env.insert("KVM".to_string(), kvm_available().to_string());
    spec.env = env;

    if kvm_available() {
        spec.devices.push(format!("{KVM_DEVICE}:{KVM_DEVICE}"));
    }

    let storage_path = config.vm_storage_path(vm.range_id, vm.id);
    spec.binds.push(format!("{}:/storage", storage_path.display()));
    if vm.extended.shared_folder_enabled {
        spec.binds.push(format!("{}/shared:/shared", storage_path.display()));
    }
    if vm.extended.global_shared_enabled {
        spec.binds.push(format!("{}:/global:ro", config.global_shared_dir.display()));
    }
    if let Some(script) = &template.post_install_script {
        let oem_dir = storage_path.join("oem");
        if let Err(e) = write_install_bat(&oem_dir, script) {
            tracing::warn!(error = %e, "failed writing OEM install.bat, skipping mount");
        } else {
            spec.binds.push(format!("{}:/oem:ro", oem_dir.display()));
        }
    }

    traefik_labels(&mut spec, &vm.id.to_string(), VNC_PORT_VM_CONSOLE, "http", false);

    spec
}

fn write_install_bat(oem_dir: &Path, script: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(oem_dir)?;
    std::fs::write(oem_dir.join("install.bat"), script)
}

/// Seeds `vm`'s storage directory from `template.golden_image_path` if the
/// template declares one and the directory is currently empty. The
/// emptiness check runs once per call and is not repeated mid-copy
/// (§4.5).
///
/// # Errors
/// Returns [`CyroidError::Io`] if the directory cannot be read or the copy
/// fails partway through.
pub fn seed_golden_image(vm: &Vm, template: &VmTemplate, config: &CyroidConfig) -> Result<bool> {
    let Some(golden) = &template.golden_image_path else {
        return Ok(false);
    };
    let storage_path = config.vm_storage_path(vm.range_id, vm.id);
    std::fs::create_dir_all(&storage_path).map_err(|e| CyroidError::Io {
        path: storage_path.clone(),
        source: e,
    })?;

    let is_empty = std::fs::read_dir(&storage_path)
        .map_err(|e| CyroidError::Io {
            path: storage_path.clone(),
            source: e,
        })?
        .next()
        .is_none();
    if !is_empty {
        return Ok(false);
    }

    copy_dir_recursive(Path::new(golden), &storage_path)?;
    Ok(true)
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    for entry in std::fs::read_dir(src).map_err(|e| CyroidError::Io {
        path: src.to_path_buf(),
        source: e,
    })? {
        let entry = entry.map_err(|e| CyroidError::Io {
            path: src.to_path_buf(),
            source: e,
        })?;
        let target = dst.join(entry.file_name());
        if entry.path().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| CyroidError::Io {
                path: target.clone(),
                source: e,
            })?;
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|e| CyroidError::Io {
                path: target.clone(),
                source: e,
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyroid_common::ids::{NetworkId, PrincipalId, RangeId, TemplateId, VmId};
    use cyroid_common::status::{NetworkStatus, VmStatus};

    fn sample_network() -> Network {
        Network {
            id: NetworkId::new(),
            range_id: RangeId::new(),
            name: "dmz".to_string(),
            subnet: "10.0.1.0/24".to_string(),
            gateway: "10.0.1.1".to_string(),
            dns: vec![],
            isolation_level: cyroid_common::status::IsolationLevel::Complete,
            status: NetworkStatus::Unprovisioned,
            runtime_handle: None,
        }
    }

    fn sample_vm(network_id: NetworkId, range_id: RangeId, template_id: TemplateId) -> Vm {
        Vm {
            id: VmId::new(),
            range_id,
            network_id,
            template_id,
            hostname: "web".to_string(),
            ip_address: "10.0.1.10".to_string(),
            cpu_count: 1,
            ram_mb: 512,
            disk_gb: 20,
            status: VmStatus::Pending,
            runtime_handle: None,
            extended: crate::model::VmExtendedConfig::default(),
        }
    }

    fn sample_template(vm_type: VmType, image: &str) -> VmTemplate {
        VmTemplate {
            id: TemplateId::new(),
            name: "tmpl".to_string(),
            os_kind: cyroid_common::status::OsKind::Linux,
            linux_distro: None,
            base_image: image.to_string(),
            vm_type,
            default_cpu: 1,
            default_ram_mb: 512,
            default_disk_gb: 20,
            post_install_script: None,
            golden_image_path: None,
            cached_iso_path: None,
            tags: vec![],
            owner_id: PrincipalId::new(),
        }
    }

    #[test]
    fn plain_container_carries_base_image_and_hostname() {
        let network = sample_network();
        let template = sample_template(VmType::Container, "nginx:alpine");
        let vm = sample_vm(network.id, network.range_id, template.id);
        let config = CyroidConfig::default();
        let spec = synthesize(&vm, &template, &network, &config).unwrap();
        assert_eq!(spec.image, "nginx:alpine");
        assert_eq!(spec.hostname, "web");
        assert!(!spec.privileged);
    }

    #[test]
    fn desktop_container_gets_kasm_labels_for_kasmweb_image() {
        let network = sample_network();
        let template = sample_template(VmType::Container, "kasmweb/desktop:latest");
        let mut vm = sample_vm(network.id, network.range_id, template.id);
        vm.extended.display_mode = DisplayMode::Desktop;
        let config = CyroidConfig::default();
        let spec = synthesize(&vm, &template, &network, &config).unwrap();
        let port_key = spec
            .labels
            .keys()
            .find(|k| k.contains("loadbalancer.server.port"))
            .unwrap();
        assert_eq!(spec.labels[port_key], VNC_PORT_KASM.to_string());
        assert!(spec.labels.keys().any(|k| k.contains("basicauth.users")));
    }

    #[test]
    fn linuxserver_family_uses_http_without_auth() {
        let network = sample_network();
        let template = sample_template(VmType::Container, "linuxserver/webtop:latest");
        let mut vm = sample_vm(network.id, network.range_id, template.id);
        vm.extended.display_mode = DisplayMode::Desktop;
        let config = CyroidConfig::default();
        let spec = synthesize(&vm, &template, &network, &config).unwrap();
        assert!(!spec.labels.keys().any(|k| k.contains("basicauth.users")));
        let scheme_key = spec
            .labels
            .keys()
            .find(|k| k.contains("loadbalancer.server.scheme"))
            .unwrap();
        assert_eq!(spec.labels[scheme_key], "http");
    }

    #[test]
    fn linux_vm_mode_sets_qemu_env_contract() {
        let network = sample_network();
        let mut template = sample_template(VmType::LinuxVm, "ignored");
        template.linux_distro = Some(crate::model::LinuxDistro::Ubuntu);
        let vm = sample_vm(network.id, network.range_id, template.id);
        let config = CyroidConfig::default();
        let spec = synthesize(&vm, &template, &network, &config).unwrap();
        assert_eq!(spec.image, QEMU_IMAGE);
        assert_eq!(spec.env.get("BOOT").unwrap(), "ubuntu");
        assert!(spec.privileged);
    }

    #[test]
    fn windows_vm_mode_sets_dockur_env_contract() {
        let network = sample_network();
        let template = sample_template(VmType::WindowsVm, "ignored");
        let mut vm = sample_vm(network.id, network.range_id, template.id);
        vm.extended.iso_source = Some("11".to_string());
        let config = CyroidConfig::default();
        let spec = synthesize(&vm, &template, &network, &config).unwrap();
        assert_eq!(spec.image, DOCKUR_WINDOWS_IMAGE);
        assert_eq!(spec.env.get("VERSION").unwrap(), "11");
    }

    #[test]
    fn mismatched_network_is_rejected() {
        let network = sample_network();
        let template = sample_template(VmType::Container, "nginx:alpine");
        let vm = sample_vm(NetworkId::new(), network.range_id, template.id);
        let config = CyroidConfig::default();
        assert!(synthesize(&vm, &template, &network, &config).is_err());
    }

    #[test]
    fn golden_image_seeds_empty_storage_once() {
        let golden = tempfile::tempdir().unwrap();
        std::fs::write(golden.path().join("disk.qcow2"), b"fake").unwrap();

        let network = sample_network();
        let mut template = sample_template(VmType::LinuxVm, "ignored");
        template.golden_image_path = Some(golden.path().to_string_lossy().to_string());
        let vm = sample_vm(network.id, network.range_id, template.id);

        let storage_root = tempfile::tempdir().unwrap();
        let mut config = CyroidConfig::default();
        config.vm_storage_dir = storage_root.path().to_path_buf();

        let seeded = seed_golden_image(&vm, &template, &config).unwrap();
        assert!(seeded);
        let storage_path = config.vm_storage_path(vm.range_id, vm.id);
        assert!(storage_path.join("disk.qcow2").exists());

        let seeded_again = seed_golden_image(&vm, &template, &config).unwrap();
        assert!(!seeded_again);
    }
}
