// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runner model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::label::{Reference, ReferenceKind, find};

/// Kind of service a runner hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunnerService {
    /// VPN client holding an identity.
    Identity,
    /// VPN session bound to a provider.
    Session,
    /// Public TCP relay.
    Relay,
    /// Proxy edge inside the identity's network namespace.
    Edge,
}

impl RunnerService {
    /// Value of the `<prefix>.project` label.
    pub fn project(&self) -> &'static str {
        match self {
            RunnerService::Identity => "myst",
            RunnerService::Session => "myst-connect",
            RunnerService::Relay => "socat",
            RunnerService::Edge => "envoy",
        }
    }

    /// Parse a `<prefix>.project` label value.
    pub fn from_project(project: &str) -> Option<Self> {
        match project {
            "myst" => Some(RunnerService::Identity),
            "myst-connect" => Some(RunnerService::Session),
            "socat" => Some(RunnerService::Relay),
            "envoy" => Some(RunnerService::Edge),
            _ => None,
        }
    }
}

impl fmt::Display for RunnerService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.project())
    }
}

/// Executor backing a runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerExec {
    /// Docker engine.
    Docker,
}

/// Runner lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunnerStatus {
    /// Created, not started yet.
    Creating,
    /// Running.
    Running,
    /// Anything else.
    Failed,
}

impl RunnerStatus {
    /// Map a runtime container state.
    pub fn from_state(state: &str) -> Self {
        match state {
            "created" => RunnerStatus::Creating,
            "running" => RunnerStatus::Running,
            _ => RunnerStatus::Failed,
        }
    }
}

/// Socket protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketType {
    /// HTTP control API.
    Http,
    /// Raw TCP.
    Tcp,
    /// No socket exposed.
    None,
}

/// Where a runner can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerSocket {
    /// Protocol.
    #[serde(rename = "type")]
    pub kind: SocketType,
    /// Host or address.
    pub uri: Option<String>,
    /// Port.
    pub port: Option<u16>,
}

impl RunnerSocket {
    /// No socket.
    pub fn none() -> Self {
        Self {
            kind: SocketType::None,
            uri: None,
            port: None,
        }
    }
}

/// Named volume role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VolumeRole {
    /// Identity keystore.
    Keystore,
}

/// Volume mounted into a runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerVolume {
    /// Role of the volume, when it has one.
    pub role: Option<VolumeRole>,
    /// Host path.
    pub source: String,
    /// Path inside the container.
    pub dest: String,
}

/// A managed container and its decoded metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Runner {
    /// Internal id (`<prefix>.id` label).
    pub id: String,
    /// Runtime container id.
    pub serial: String,
    /// Container name.
    pub name: String,
    /// Hosted service.
    pub service: RunnerService,
    /// Executor.
    pub exec: RunnerExec,
    /// Socket descriptor.
    pub socket: RunnerSocket,
    /// References decoded from the labels.
    pub label: Vec<Reference>,
    /// Mounted volumes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<RunnerVolume>,
    /// Status.
    pub status: RunnerStatus,
    /// Creation time.
    pub insert_date: DateTime<Utc>,
}

impl Runner {
    /// First reference of a kind.
    pub fn reference(&self, kind: ReferenceKind) -> Option<&Reference> {
        find(&self.label, kind)
    }

    /// `id` of the first reference of a kind.
    pub fn reference_id(&self, kind: ReferenceKind) -> Option<&str> {
        self.reference(kind).and_then(Reference::id)
    }

    /// Whether the runner is running.
    pub fn is_running(&self) -> bool {
        self.status == RunnerStatus::Running
    }
}

/// Request to provision a runner.
///
/// `label` holds raw references; creators decode and validate them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerRequest {
    /// Container name.
    pub name: String,
    /// Service to provision.
    pub service: RunnerService,
    /// Raw references.
    pub label: Vec<Value>,
    /// Requested host port, relays only.
    #[serde(default)]
    pub socket_port: Option<u16>,
    /// Volumes to mount.
    #[serde(default)]
    pub volumes: Vec<RunnerVolume>,
}

impl RunnerRequest {
    /// Request with the given references and no volumes.
    pub fn new(name: impl Into<String>, service: RunnerService, references: &[Reference]) -> Self {
        Self {
            name: name.into(),
            service,
            label: crate::label::encode(references),
            socket_port: None,
            volumes: Vec::new(),
        }
    }

    /// Ask for a specific host port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.socket_port = Some(port);
        self
    }

    /// Mount a volume.
    pub fn with_volume(mut self, volume: RunnerVolume) -> Self {
        self.volumes.push(volume);
        self
    }

    /// Volume with the given role.
    pub fn volume(&self, role: VolumeRole) -> Option<&RunnerVolume> {
        self.volumes.iter().find(|v| v.role == Some(role))
    }
}
