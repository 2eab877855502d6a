// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Docker CLI runtime.
//!
//! Shells out to the `docker` binary and parses the JSON it prints. Engine
//! failures are mapped onto [`RuntimeError`] from the command's stderr.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::process::Command;
use tracing::debug;

use super::{
    ContainerFilter, ContainerRuntime, ContainerSpec, ContainerState, ContainerSummary,
    NetworkInfo, RuntimeError, VolumeInfo, VolumeSpec,
};

/// Container runtime backed by the `docker` command line client.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerCli {
    /// Use `docker` from `PATH`.
    pub fn new() -> Self {
        Self {
            binary: "docker".to_string(),
        }
    }

    /// Use a specific client binary (e.g. `podman`).
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run<I, S>(&self, args: I) -> Result<CommandOutput, RuntimeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        debug!(command = ?cmd.as_std(), "Running container runtime command");

        let output = cmd
            .output()
            .await
            .map_err(|e| RuntimeError::new(500, format!("Failed to run {}: {}", self.binary, e)))?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    async fn exec<I, S>(&self, args: I) -> Result<String, RuntimeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let output = self.run(args).await?;
        if !output.success {
            return Err(classify(output.stderr));
        }
        Ok(output.stdout)
    }

    async fn inspect<T: DeserializeOwned>(&self, args: &[&str]) -> Result<Vec<T>, RuntimeError> {
        let stdout = self.exec(args).await?;
        parse_inspect(&stdout)
    }
}

struct CommandOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

fn parse_inspect<T: DeserializeOwned>(stdout: &str) -> Result<Vec<T>, RuntimeError> {
    if stdout.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(stdout)
        .map_err(|e| RuntimeError::new(500, format!("Malformed inspect output: {}", e)))
}

/// True when every stderr line reports an object that no longer exists.
fn only_missing_objects(stderr: &str) -> bool {
    let mut lines = stderr.lines().filter(|l| !l.trim().is_empty()).peekable();
    lines.peek().is_some() && lines.all(|l| l.contains("No such object") || l.contains("No such container"))
}

fn classify(stderr: String) -> RuntimeError {
    let code = if stderr.contains("No such") {
        404
    } else if stderr.contains("Conflict") {
        409
    } else {
        500
    };
    RuntimeError::new(code, stderr)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VolumeJson {
    name: String,
    #[serde(default)]
    labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct IpamConfigJson {
    #[serde(rename = "Subnet", default)]
    subnet: Option<String>,
    #[serde(rename = "Gateway", default)]
    gateway: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IpamJson {
    #[serde(rename = "Config", default)]
    config: Option<Vec<IpamConfigJson>>,
}

#[derive(Debug, Deserialize)]
struct NetworkEndpointJson {
    #[serde(rename = "IPv4Address", default)]
    ipv4_address: String,
}

#[derive(Debug, Deserialize)]
struct NetworkJson {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "IPAM")]
    ipam: IpamJson,
    #[serde(rename = "Containers", default)]
    containers: Option<BTreeMap<String, NetworkEndpointJson>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StateJson {
    status: String,
    #[serde(default)]
    exit_code: i64,
    #[serde(default)]
    error: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConfigJson {
    #[serde(default)]
    labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct EndpointJson {
    #[serde(rename = "IPAddress", default)]
    ip_address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkSettingsJson {
    #[serde(default)]
    networks: Option<BTreeMap<String, EndpointJson>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerJson {
    id: String,
    name: String,
    created: DateTime<Utc>,
    state: StateJson,
    config: ConfigJson,
    network_settings: NetworkSettingsJson,
}

impl From<ContainerJson> for ContainerSummary {
    fn from(c: ContainerJson) -> Self {
        let networks = c
            .network_settings
            .networks
            .unwrap_or_default()
            .into_iter()
            .filter(|(_, endpoint)| !endpoint.ip_address.is_empty())
            .map(|(name, endpoint)| (name, endpoint.ip_address))
            .collect();

        ContainerSummary {
            id: c.id,
            name: c.name.trim_start_matches('/').to_string(),
            labels: c.config.labels.unwrap_or_default(),
            state: c.state.status,
            networks,
            created: c.created,
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn inspect_volume(&self, name: &str) -> Result<VolumeInfo, RuntimeError> {
        let volumes: Vec<VolumeJson> = self.inspect(&["volume", "inspect", name]).await?;
        volumes
            .into_iter()
            .next()
            .map(|v| VolumeInfo {
                name: v.name,
                labels: v.labels.unwrap_or_default(),
            })
            .ok_or_else(|| RuntimeError::not_found(format!("No such volume: {}", name)))
    }

    async fn create_volume(&self, spec: &VolumeSpec) -> Result<(), RuntimeError> {
        let mut args = vec![
            "volume".to_string(),
            "create".to_string(),
            "--driver".to_string(),
            "local".to_string(),
            "--opt".to_string(),
            "type=none".to_string(),
            "--opt".to_string(),
            "o=bind".to_string(),
            "--opt".to_string(),
            format!("device={}", spec.device),
        ];
        for (key, value) in &spec.labels {
            args.push("--label".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push(spec.name.clone());

        self.exec(&args).await?;
        Ok(())
    }

    async fn inspect_network(&self, name: &str) -> Result<NetworkInfo, RuntimeError> {
        let networks: Vec<NetworkJson> = self.inspect(&["network", "inspect", name]).await?;
        let network = networks
            .into_iter()
            .next()
            .ok_or_else(|| RuntimeError::not_found(format!("No such network: {}", name)))?;

        let ipam = network
            .ipam
            .config
            .unwrap_or_default()
            .into_iter()
            .find(|c| c.subnet.as_deref().is_some_and(|s| s.contains('.')));

        Ok(NetworkInfo {
            name: network.name,
            subnet: ipam.as_ref().and_then(|c| c.subnet.clone()),
            gateway: ipam.and_then(|c| c.gateway),
            endpoints: network
                .containers
                .unwrap_or_default()
                .into_values()
                .map(|e| e.ipv4_address)
                .filter(|a| !a.is_empty())
                .collect(),
        })
    }

    async fn list_containers(
        &self,
        filter: &ContainerFilter,
    ) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let mut args = vec!["ps".to_string(), "-q".to_string(), "--no-trunc".to_string()];
        if filter.all {
            args.push("-a".to_string());
        }
        for status in &filter.status {
            args.push("--filter".to_string());
            args.push(format!("status={}", status));
        }
        for (key, value) in &filter.labels {
            args.push("--filter".to_string());
            match value {
                Some(value) => args.push(format!("label={}={}", key, value)),
                None => args.push(format!("label={}", key)),
            }
        }
        if let Some(name) = &filter.name {
            args.push("--filter".to_string());
            args.push(format!("name={}", name));
        }

        let stdout = self.exec(&args).await?;
        let ids: Vec<&str> = stdout.lines().filter(|l| !l.trim().is_empty()).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut inspect_args = vec!["inspect"];
        inspect_args.extend(ids);
        // Containers removed after `ps` are reported on stderr; the rest are still printed.
        let output = self.run(&inspect_args).await?;
        if !output.success {
            if !only_missing_objects(&output.stderr) {
                return Err(classify(output.stderr));
            }
            debug!(stderr = %output.stderr, "Skipping containers removed during listing");
        }
        let containers: Vec<ContainerJson> = parse_inspect(&output.stdout)?;

        // The engine's name filter is a substring match.
        Ok(containers
            .into_iter()
            .map(ContainerSummary::from)
            .filter(|c| filter.matches(c))
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerState, RuntimeError> {
        let containers: Vec<ContainerJson> = self.inspect(&["inspect", id]).await?;
        containers
            .into_iter()
            .next()
            .map(|c| ContainerState {
                status: c.state.status,
                exit_code: c.state.exit_code,
                error: c.state.error,
            })
            .ok_or_else(|| RuntimeError::not_found(format!("No such container: {}", id)))
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        self.exec(create_args(spec)).await
    }

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.exec(["start", id]).await?;
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.exec(["rm", "-f", "-v", id]).await?;
        Ok(())
    }
}

fn create_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec![
        "create".to_string(),
        "--name".to_string(),
        spec.name.clone(),
    ];
    for (key, value) in &spec.labels {
        args.push("--label".to_string());
        args.push(format!("{}={}", key, value));
    }
    for env in &spec.env {
        args.push("-e".to_string());
        args.push(env.clone());
    }
    for bind in &spec.binds {
        args.push("-v".to_string());
        args.push(bind.clone());
    }
    if !spec.network.is_empty() {
        args.push("--network".to_string());
        args.push(spec.network.clone());
    }
    if let Some(ip) = &spec.ipv4_address {
        args.push("--ip".to_string());
        args.push(ip.clone());
    }
    for cap in &spec.cap_add {
        args.push("--cap-add".to_string());
        args.push(cap.clone());
    }
    for device in &spec.devices {
        args.push("--device".to_string());
        args.push(device.clone());
    }
    for (container_port, host_port) in &spec.port_bindings {
        args.push("-p".to_string());
        args.push(format!("{}:{}/tcp", host_port, container_port));
    }
    if spec.restart_always {
        args.push("--restart".to_string());
        args.push("always".to_string());
    }
    args.push(spec.image.clone());
    args.extend(spec.cmd.iter().cloned());
    args
}
