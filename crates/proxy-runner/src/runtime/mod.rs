// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Container runtime abstraction.
//!
//! The creators and the runner repository only ever talk to the runtime
//! through [`ContainerRuntime`]. Two implementations ship with the crate:
//!
//! | Implementation | Use |
//! |----------------|-----|
//! | [`docker::DockerCli`] | drives the `docker` CLI |
//! | [`mock::MockRuntime`] | in-memory runtime for tests |

pub mod docker;
pub mod mock;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error reported by the container runtime.
///
/// `code` follows the HTTP-style status the Docker engine uses (404 for a
/// missing object, 409 for a name conflict, 500 otherwise).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message} (code {code})")]
pub struct RuntimeError {
    /// Status code.
    pub code: u16,
    /// Message returned by the engine.
    pub message: String,
}

impl RuntimeError {
    /// Create a runtime error.
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// A missing volume, network or container.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    /// Whether the object the call referred to does not exist.
    pub fn is_not_found(&self) -> bool {
        self.code == 404 || self.message.contains("No such")
    }

    /// Whether a static address collided with another endpoint.
    pub fn is_address_in_use(&self) -> bool {
        self.message.contains("Address already in use")
    }

    /// Whether a published host port is taken.
    pub fn is_port_allocated(&self) -> bool {
        self.message.contains("port is already allocated")
    }
}

/// Volume as reported by the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    /// Volume name.
    pub name: String,
    /// Volume labels.
    pub labels: BTreeMap<String, String>,
}

/// Local bind volume to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSpec {
    /// Volume name.
    pub name: String,
    /// Host directory the volume binds to.
    pub device: String,
    /// Volume labels.
    pub labels: BTreeMap<String, String>,
}

/// Network as reported by the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Network name.
    pub name: String,
    /// IPv4 subnet in CIDR notation.
    pub subnet: Option<String>,
    /// Gateway address.
    pub gateway: Option<String>,
    /// Addresses of the attached endpoints, with or without a prefix length.
    pub endpoints: Vec<String>,
}

/// Selection criteria for [`ContainerRuntime::list_containers`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerFilter {
    /// Include stopped and created containers.
    pub all: bool,
    /// Container states to keep (`created`, `running`, ...).
    pub status: Vec<String>,
    /// Label constraints; a `None` value only requires the key.
    pub labels: Vec<(String, Option<String>)>,
    /// Exact container name.
    pub name: Option<String>,
}

impl ContainerFilter {
    /// Filter over every container regardless of state.
    pub fn all() -> Self {
        Self {
            all: true,
            ..Self::default()
        }
    }

    /// Filter over running containers only.
    pub fn running() -> Self {
        Self::default()
    }

    /// Require a label with the given value.
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), Some(value.into())));
        self
    }

    /// Require every entry of a label map.
    pub fn labels<'a>(mut self, labels: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        for (key, value) in labels {
            self.labels.push((key.clone(), Some(value.clone())));
        }
        self
    }

    /// Require a label key regardless of its value.
    pub fn label_key(mut self, key: impl Into<String>) -> Self {
        self.labels.push((key.into(), None));
        self
    }

    /// Keep containers in the given state.
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status.push(status.into());
        self
    }

    /// Keep the container with this exact name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Whether a container summary satisfies this filter.
    pub fn matches(&self, container: &ContainerSummary) -> bool {
        if !self.all && container.state != "running" {
            return false;
        }
        if !self.status.is_empty() && !self.status.iter().any(|s| s == &container.state) {
            return false;
        }
        if let Some(name) = &self.name
            && name != &container.name
        {
            return false;
        }
        self.labels.iter().all(|(key, value)| match value {
            Some(value) => container.labels.get(key) == Some(value),
            None => container.labels.contains_key(key),
        })
    }
}

/// Container as returned by a list call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    /// Runtime container id.
    pub id: String,
    /// Container name without the leading slash.
    pub name: String,
    /// Container labels.
    pub labels: BTreeMap<String, String>,
    /// Runtime state (`created`, `running`, `exited`, ...).
    pub state: String,
    /// IPv4 address per attached network.
    pub networks: BTreeMap<String, String>,
    /// Creation time.
    pub created: DateTime<Utc>,
}

/// Last known state of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerState {
    /// Runtime state.
    pub status: String,
    /// Exit code of the last run.
    pub exit_code: i64,
    /// Error recorded by the engine for the last start.
    pub error: String,
}

/// Container to create.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Container name.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Command arguments.
    pub cmd: Vec<String>,
    /// `KEY=value` environment entries.
    pub env: Vec<String>,
    /// Container labels.
    pub labels: BTreeMap<String, String>,
    /// `source:dest[:mode]` bind mounts.
    pub binds: Vec<String>,
    /// Network to attach.
    pub network: String,
    /// Static IPv4 address on `network`.
    pub ipv4_address: Option<String>,
    /// Added capabilities.
    pub cap_add: Vec<String>,
    /// Host devices mapped into the container.
    pub devices: Vec<String>,
    /// `(container_port, host_port)` TCP mappings.
    pub port_bindings: Vec<(u16, u16)>,
    /// Restart the container whenever it stops.
    pub restart_always: bool,
}

/// Container runtime operations.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Inspect a volume by name.
    async fn inspect_volume(&self, name: &str) -> Result<VolumeInfo, RuntimeError>;

    /// Create a local bind volume.
    async fn create_volume(&self, spec: &VolumeSpec) -> Result<(), RuntimeError>;

    /// Inspect a network by name.
    async fn inspect_network(&self, name: &str) -> Result<NetworkInfo, RuntimeError>;

    /// List containers matching the filter.
    async fn list_containers(
        &self,
        filter: &ContainerFilter,
    ) -> Result<Vec<ContainerSummary>, RuntimeError>;

    /// Inspect the last state of a container.
    async fn inspect_container(&self, id: &str) -> Result<ContainerState, RuntimeError>;

    /// Create a container and return its id.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;

    /// Start a created container.
    async fn start_container(&self, id: &str) -> Result<(), RuntimeError>;

    /// Force-remove a container together with its anonymous volumes.
    async fn remove_container(&self, id: &str) -> Result<(), RuntimeError>;
}
