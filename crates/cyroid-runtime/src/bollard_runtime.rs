//! `bollard`-backed implementation of [`ContainerRuntime`].
//!
//! Talks to the Docker Engine API exactly the way the reference
//! implementation's `DockerService` does (network-then-range attachment
//! order, `unless-stopped` restart policy, tar-stream `copy_to`), just
//! through `bollard`'s async client instead of a synchronous `docker-py`
//! wrapper.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, RemoveContainerOptions, RestartContainerOptions,
    StartContainerOptions, Stats as BollardStats, StatsOptions, StopContainerOptions,
    UploadToContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::network::{ConnectNetworkOptions, CreateNetworkOptions};
use bollard::models::{EndpointIpamConfig, EndpointSettings, HostConfig, Ipam, IpamConfig};
use bollard::query_parameters::{
    CommitContainerOptions, ListContainersOptions, ListNetworksOptions, RemoveNetworkOptions,
};
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::io::AsyncWriteExt;

use crate::backend::{ContainerHandle, ContainerRuntime, InteractiveExec, NetworkHandle, Result, RuntimeError};
use crate::spec::{ContainerSpec, CopySource, ExecOptions, ExecResult, LayerStatus, PullProgress, Stats};
use cyroid_common::constants::ROUTING_NETWORK_NAME;

/// Adapter backed by a live `bollard::Docker` connection.
pub struct BollardRuntime {
    docker: Docker,
}

impl BollardRuntime {
    /// Connects using the local defaults (Unix socket on Linux, named
    /// pipe on Windows).
    ///
    /// # Errors
    /// Returns [`RuntimeError::Transient`] if the engine is unreachable.
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeError::Transient(e.to_string()))?;
        Ok(Self { docker })
    }

    /// Ensures the shared routing network exists, creating it if absent.
    async fn ensure_routing_network(&self) -> Result<()> {
        let exists = self
            .docker
            .inspect_network::<String>(ROUTING_NETWORK_NAME, None)
            .await
            .is_ok();
        if exists {
            return Ok(());
        }
        let opts = CreateNetworkOptions {
            name: ROUTING_NETWORK_NAME,
            driver: "bridge",
            ..Default::default()
        };
        match self.docker.create_network(opts).await {
            Ok(_) => Ok(()),
            Err(e) if is_conflict(&e) => Ok(()),
            Err(e) => Err(map_err(e)),
        }
    }
}

fn map_err(e: bollard::errors::Error) -> RuntimeError {
    if is_not_found(&e) {
        RuntimeError::NotFound(e.to_string())
    } else if is_conflict(&e) {
        RuntimeError::Conflict(e.to_string())
    } else {
        RuntimeError::Transient(e.to_string())
    }
}

fn is_not_found(e: &bollard::errors::Error) -> bool {
    matches!(e, bollard::errors::Error::DockerResponseServerError { status_code, .. } if *status_code == 404)
}

fn is_conflict(e: &bollard::errors::Error) -> bool {
    matches!(e, bollard::errors::Error::DockerResponseServerError { status_code, .. } if *status_code == 409)
}

#[async_trait]
impl ContainerRuntime for BollardRuntime {
    async fn create_network(
        &self,
        name: &str,
        subnet: &str,
        gateway: &str,
        internal: bool,
        labels: &HashMap<String, String>,
    ) -> Result<NetworkHandle> {
        let ipam = Ipam {
            config: Some(vec![IpamConfig {
                subnet: Some(subnet.to_string()),
                gateway: Some(gateway.to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        };
        let opts = CreateNetworkOptions {
            name,
            driver: "bridge",
            internal,
            attachable: true,
            ipam,
            labels: labels.clone(),
            ..Default::default()
        };
        let response = self.docker.create_network(opts).await.map_err(map_err)?;
        let id = response.id.ok_or_else(|| {
            RuntimeError::Unrecoverable("engine returned no network id".to_string())
        })?;
        Ok(NetworkHandle(id))
    }

    async fn delete_network(&self, handle: &NetworkHandle) -> Result<()> {
        match self
            .docker
            .remove_network(&handle.0, None::<RemoveNetworkOptions>)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(map_err(e)),
        }
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerHandle> {
        self.ensure_image(&spec.image).await?;
        self.ensure_routing_network().await?;

        let host_config = HostConfig {
            cpu_count: Some(i64::from(spec.cpu_count)),
            memory: Some(i64::from(spec.memory_mb) * 1024 * 1024),
            binds: if spec.binds.is_empty() {
                None
            } else {
                Some(spec.binds.clone())
            },
            privileged: Some(spec.privileged),
            cap_add: if spec.cap_add.is_empty() {
                None
            } else {
                Some(spec.cap_add.clone())
            },
            devices: if spec.devices.is_empty() {
                None
            } else {
                Some(
                    spec.devices
                        .iter()
                        .filter_map(|d| {
                            let mut parts = d.splitn(2, ':');
                            let host = parts.next()?;
                            let container = parts.next().unwrap_or(host);
                            Some(bollard::models::DeviceMapping {
                                path_on_host: Some(host.to_string()),
                                path_in_container: Some(container.to_string()),
                                cgroup_permissions: Some("rwm".to_string()),
                            })
                        })
                        .collect(),
                )
            },
            restart_policy: Some(bollard::models::RestartPolicy {
                name: Some(restart_policy_name(&spec.restart_policy)),
                ..Default::default()
            }),
            ..Default::default()
        };

        // Attach to the routing network first so the reverse proxy has a
        // stable backend IP regardless of which range network a VM moves
        // between (§4.1).
        let mut endpoints = HashMap::new();
        endpoints.insert(ROUTING_NETWORK_NAME.to_string(), EndpointSettings::default());

        let config = Config {
            image: Some(spec.image.clone()),
            hostname: Some(spec.hostname.clone()),
            tty: Some(true),
            open_stdin: Some(true),
            env: Some(
                spec.env
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect(),
            ),
            labels: Some(spec.labels.clone()),
            host_config: Some(host_config),
            networking_config: Some(bollard::container::NetworkingConfig {
                endpoints_config: endpoints,
            }),
            ..Default::default()
        };

        let create_opts = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        let response = self
            .docker
            .create_container(Some(create_opts), config)
            .await
            .map_err(map_err)?;
        let handle = ContainerHandle(response.id);

        // Then connect to the range network with the static IP.
        let connect_opts = ConnectNetworkOptions {
            container: handle.0.clone(),
            endpoint_config: EndpointSettings {
                ipam_config: Some(EndpointIpamConfig {
                    ipv4_address: Some(spec.ip_address.clone()),
                    ..Default::default()
                }),
                ..Default::default()
            },
        };
        self.docker
            .connect_network(&spec.network_id, connect_opts)
            .await
            .map_err(map_err)?;

        Ok(handle)
    }

    async fn start(&self, handle: &ContainerHandle) -> Result<()> {
        match self
            .docker
            .start_container(&handle.0, None::<StartContainerOptions<String>>)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if is_conflict(&e) => Ok(()), // already started
            Err(e) => Err(map_err(e)),
        }
    }

    async fn stop(&self, handle: &ContainerHandle, grace: Duration) -> Result<()> {
        let opts = StopContainerOptions {
            t: Some(i64::try_from(grace.as_secs()).unwrap_or(i64::MAX)),
            ..Default::default()
        };
        match self.docker.stop_container(&handle.0, Some(opts)).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(map_err(e)),
        }
    }

    async fn restart(&self, handle: &ContainerHandle, grace: Duration) -> Result<()> {
        let opts = RestartContainerOptions {
            t: Some(i32::try_from(grace.as_secs()).unwrap_or(i32::MAX)),
        };
        self.docker
            .restart_container(&handle.0, Some(opts))
            .await
            .map_err(map_err)
    }

    async fn remove(&self, handle: &ContainerHandle) -> Result<()> {
        let opts = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        match self.docker.remove_container(&handle.0, Some(opts)).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(map_err(e)),
        }
    }

    async fn exec(
        &self,
        handle: &ContainerHandle,
        argv: &[String],
        opts: &ExecOptions,
    ) -> Result<ExecResult> {
        let create_opts = CreateExecOptions {
            cmd: Some(argv.to_vec()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            env: Some(
                opts.env
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect(),
            ),
            user: opts.user.clone(),
            working_dir: opts.workdir.clone(),
            tty: Some(opts.tty),
            ..Default::default()
        };
        let exec = self
            .docker
            .create_exec(&handle.0, create_opts)
            .await
            .map_err(map_err)?;

        let mut combined = String::new();
        if let StartExecResults::Attached { mut output, .. } = self
            .docker
            .start_exec(&exec.id, None::<StartExecOptions>)
            .await
            .map_err(map_err)?
        {
            while let Some(Ok(msg)) = output.next().await {
                combined.push_str(&msg.to_string());
            }
        }
        Ok(ExecResult {
            exit_code: self.exec_exit_code(&exec.id).await?,
            output: combined,
        })
    }

    async fn exec_interactive(
        &self,
        handle: &ContainerHandle,
        argv: &[String],
    ) -> Result<Box<dyn InteractiveExec>> {
        let create_opts = CreateExecOptions {
            cmd: Some(argv.to_vec()),
            attach_stdin: Some(true),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(true),
            ..Default::default()
        };
        let exec = self
            .docker
            .create_exec(&handle.0, create_opts)
            .await
            .map_err(map_err)?;

        let start_opts = StartExecOptions {
            detach: false,
            tty: true,
            ..Default::default()
        };
        match self
            .docker
            .start_exec(&exec.id, Some(start_opts))
            .await
            .map_err(map_err)?
        {
            StartExecResults::Attached { input, output } => {
                Ok(Box::new(BollardInteractiveExec { input, output }))
            }
            StartExecResults::Detached => Err(RuntimeError::Unrecoverable(
                "engine detached an exec requested as interactive".to_string(),
            )),
        }
    }

    async fn copy_to(&self, handle: &ContainerHandle, source: &CopySource) -> Result<()> {
        let mut tar_bytes = Vec::new();
        {
            let mut builder = tar::Builder::new(&mut tar_bytes);
            let file_name = source
                .local_path
                .file_name()
                .ok_or_else(|| RuntimeError::Unrecoverable("copy source has no file name".to_string()))?;
            builder
                .append_path_with_name(&source.local_path, file_name)
                .map_err(|e| RuntimeError::Unrecoverable(e.to_string()))?;
            builder
                .finish()
                .map_err(|e| RuntimeError::Unrecoverable(e.to_string()))?;
        }

        let opts = UploadToContainerOptions {
            path: source.container_dir.clone(),
            ..Default::default()
        };
        self.docker
            .upload_to_container(&handle.0, Some(opts), tar_bytes.into())
            .await
            .map_err(map_err)
    }

    async fn commit(&self, handle: &ContainerHandle, repo_tag: &str) -> Result<String> {
        let (repo, tag) = repo_tag.split_once(':').unwrap_or((repo_tag, "latest"));
        let opts = CommitContainerOptions {
            container: handle.0.clone(),
            repo: Some(repo.to_string()),
            tag: Some(tag.to_string()),
            ..Default::default()
        };
        let result = self
            .docker
            .commit_container(opts, Config::<String>::default())
            .await
            .map_err(|e| RuntimeError::Unrecoverable(e.to_string()))?;
        Ok(result.id)
    }

    async fn pull_stream(
        &self,
        image: &str,
    ) -> Result<BoxStream<'static, PullProgress>> {
        let opts = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };
        let stream = self.docker.create_image(Some(opts), None, None);
        let mapped = stream.map(|item| match item {
            Ok(info) => {
                if let Some(progress_detail) = info.progress_detail {
                    PullProgress::Layer {
                        layer_id: info.id.unwrap_or_default(),
                        bytes_current: progress_detail.current.unwrap_or(0).max(0) as u64,
                        bytes_total: progress_detail.total.and_then(|t| u64::try_from(t).ok()),
                        status: classify_layer_status(info.status.as_deref()),
                    }
                } else if info.status.as_deref() == Some("Download complete")
                    || info.status.as_deref().unwrap_or_default().starts_with("Status: Downloaded")
                {
                    PullProgress::Complete
                } else {
                    PullProgress::Layer {
                        layer_id: info.id.unwrap_or_default(),
                        bytes_current: 0,
                        bytes_total: None,
                        status: classify_layer_status(info.status.as_deref()),
                    }
                }
            }
            Err(e) => PullProgress::Error {
                message: e.to_string(),
            },
        });
        let with_terminator = mapped.chain(stream::once(async { PullProgress::Complete }));
        Ok(with_terminator.boxed())
    }

    async fn stats(&self, handle: &ContainerHandle) -> Result<Option<Stats>> {
        let opts = StatsOptions {
            stream: false,
            one_shot: true,
        };
        let mut stream = self.docker.stats(&handle.0, Some(opts));
        let Some(Ok(raw)) = stream.next().await else {
            return Ok(None);
        };
        Ok(compute_stats(&raw))
    }

    async fn container_ip(&self, handle: &ContainerHandle) -> Result<Option<String>> {
        let info = self
            .docker
            .inspect_container(&handle.0, None)
            .await
            .map_err(map_err)?;
        let Some(networks) = info
            .network_settings
            .and_then(|n| n.networks)
        else {
            return Ok(None);
        };
        for settings in networks.values() {
            if let Some(ip) = settings.ip_address.clone().filter(|s| !s.is_empty()) {
                return Ok(Some(ip));
            }
        }
        Ok(None)
    }

    async fn list_containers(
        &self,
        label_filter: &HashMap<String, String>,
    ) -> Result<Vec<ContainerHandle>> {
        let mut filters = HashMap::new();
        filters.insert(
            "label".to_string(),
            label_filter
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>(),
        );
        let opts = ListContainersOptions {
            all: true,
            filters,
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(opts)).await.map_err(map_err)?;
        Ok(containers
            .into_iter()
            .filter_map(|c| c.id.map(ContainerHandle))
            .collect())
    }

    async fn list_networks(
        &self,
        label_filter: &HashMap<String, String>,
    ) -> Result<Vec<NetworkHandle>> {
        let mut filters = HashMap::new();
        filters.insert(
            "label".to_string(),
            label_filter
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>(),
        );
        let opts = ListNetworksOptions { filters };
        let networks = self.docker.list_networks(Some(opts)).await.map_err(map_err)?;
        Ok(networks
            .into_iter()
            .filter_map(|n| n.id.map(NetworkHandle))
            .collect())
    }
}

impl BollardRuntime {
    async fn exec_exit_code(&self, exec_id: &str) -> Result<i64> {
        let inspect = self
            .docker
            .inspect_exec(exec_id)
            .await
            .map_err(map_err)?;
        Ok(inspect.exit_code.unwrap_or(-1))
    }
}

fn restart_policy_name(name: &str) -> bollard::models::RestartPolicyNameEnum {
    use bollard::models::RestartPolicyNameEnum as P;
    match name {
        "always" => P::ALWAYS,
        "on-failure" => P::ON_FAILURE,
        "no" => P::NO,
        _ => P::UNLESS_STOPPED,
    }
}

fn classify_layer_status(status: Option<&str>) -> LayerStatus {
    match status {
        Some(s) if s.starts_with("Already exists") => LayerStatus::AlreadyExists,
        Some(s) if s.starts_with("Pull complete") || s.starts_with("Download complete") => {
            LayerStatus::Complete
        }
        _ => LayerStatus::Pulling,
    }
}

/// Reproduces `docker_service.get_container_stats`'s formulas exactly:
/// CPU normalized to 0-100% across all cores, memory in MB, network
/// bytes summed across every attached interface.
fn compute_stats(raw: &BollardStats) -> Option<Stats> {
    let cpu_delta = raw
        .cpu_stats
        .cpu_usage
        .total_usage
        .checked_sub(raw.precpu_stats.cpu_usage.total_usage)?;
    let system_delta = raw
        .cpu_stats
        .system_cpu_usage
        .unwrap_or(0)
        .checked_sub(raw.precpu_stats.system_cpu_usage.unwrap_or(0))?;
    let cpu_pct = if system_delta > 0 {
        (cpu_delta as f64 / system_delta as f64) * 100.0
    } else {
        0.0
    };

    let mem_usage = raw.memory_stats.usage.unwrap_or(0) as f64;
    let mem_limit = raw.memory_stats.limit.unwrap_or(0) as f64;
    let mem_mb = mem_usage / (1024.0 * 1024.0);
    let mem_pct = if mem_limit > 0.0 {
        (mem_usage / mem_limit) * 100.0
    } else {
        0.0
    };

    let (rx_bytes, tx_bytes) = raw
        .networks
        .as_ref()
        .map(|nets| {
            nets.values().fold((0u64, 0u64), |(rx, tx), n| {
                (
                    rx + n.rx_bytes.unwrap_or(0) as u64,
                    tx + n.tx_bytes.unwrap_or(0) as u64,
                )
            })
        })
        .unwrap_or((0, 0));

    Some(Stats {
        cpu_pct: round2(cpu_pct),
        mem_mb: round2(mem_mb),
        mem_pct: round2(mem_pct),
        rx_bytes,
        tx_bytes,
    })
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

struct BollardInteractiveExec {
    input: Box<dyn tokio::io::AsyncWrite + Send + Unpin>,
    output: BoxStream<'static, std::result::Result<bollard::container::LogOutput, bollard::errors::Error>>,
}

#[async_trait]
impl InteractiveExec for BollardInteractiveExec {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.output.next().await {
            Some(Ok(chunk)) => {
                let bytes = chunk.into_bytes();
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Some(Err(e)) => Err(map_err(e)),
            None => Ok(0),
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.input
            .write_all(data)
            .await
            .map_err(|e| RuntimeError::Transient(e.to_string()))?;
        self.input
            .flush()
            .await
            .map_err(|e| RuntimeError::Transient(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_layer_status_maps_known_strings() {
        assert_eq!(
            classify_layer_status(Some("Already exists")),
            LayerStatus::AlreadyExists
        );
        assert_eq!(
            classify_layer_status(Some("Pull complete")),
            LayerStatus::Complete
        );
        assert_eq!(classify_layer_status(Some("Downloading")), LayerStatus::Pulling);
        assert_eq!(classify_layer_status(None), LayerStatus::Pulling);
    }

    #[test]
    fn restart_policy_name_defaults_to_unless_stopped() {
        assert_eq!(
            restart_policy_name("bogus"),
            bollard::models::RestartPolicyNameEnum::UNLESS_STOPPED
        );
    }
}
