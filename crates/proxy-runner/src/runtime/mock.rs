// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock runtime for testing.
//!
//! Keeps volumes, one network and containers in memory, records every call,
//! and lets tests script failures for upcoming create/start calls.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{
    ContainerFilter, ContainerRuntime, ContainerSpec, ContainerState, ContainerSummary,
    NetworkInfo, RuntimeError, VolumeInfo, VolumeSpec,
};

/// A call observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    /// `inspect_volume(name)`
    InspectVolume(String),
    /// `create_volume(spec.name)`
    CreateVolume(String),
    /// `inspect_network(name)`
    InspectNetwork(String),
    /// `list_containers`
    ListContainers,
    /// `inspect_container(id)`
    InspectContainer(String),
    /// `create_container(spec.name)`
    CreateContainer(String),
    /// `start_container(id)`
    StartContainer(String),
    /// `remove_container(id)`
    RemoveContainer(String),
}

#[derive(Debug, Clone)]
struct MockContainer {
    summary: ContainerSummary,
    spec: Option<ContainerSpec>,
    state: ContainerState,
}

#[derive(Debug, Default)]
struct MockState {
    volumes: HashMap<String, VolumeSpec>,
    network: NetworkInfo,
    containers: Vec<MockContainer>,
    calls: Vec<RuntimeCall>,
    create_failures: VecDeque<RuntimeError>,
    start_failures: VecDeque<RuntimeError>,
    next_id: u64,
}

/// In-memory container runtime.
#[derive(Debug, Clone, Default)]
pub struct MockRuntime {
    state: Arc<Mutex<MockState>>,
}

impl MockRuntime {
    /// Create a mock with an empty network named `name`.
    pub fn new(name: &str, subnet: &str, gateway: &str) -> Self {
        let state = MockState {
            network: NetworkInfo {
                name: name.to_string(),
                subnet: Some(subnet.to_string()),
                gateway: Some(gateway.to_string()),
                endpoints: Vec::new(),
            },
            ..MockState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Attach a foreign endpoint address to the network.
    pub async fn add_endpoint(&self, address: &str) {
        self.state.lock().await.network.endpoints.push(address.to_string());
    }

    /// Fail the next `create_container` call with `error`.
    pub async fn fail_next_create(&self, error: RuntimeError) {
        self.state.lock().await.create_failures.push_back(error);
    }

    /// Fail the next `start_container` call with `error`.
    ///
    /// The container stays in `created` state, as it would with a real engine.
    pub async fn fail_next_start(&self, error: RuntimeError) {
        self.state.lock().await.start_failures.push_back(error);
    }

    /// Seed an existing container; returns its id.
    pub async fn insert_container(
        &self,
        name: &str,
        state: &str,
        labels: BTreeMap<String, String>,
        networks: BTreeMap<String, String>,
    ) -> String {
        let mut guard = self.state.lock().await;
        guard.next_id += 1;
        let id = format!("{:064x}", guard.next_id);
        if state == "running"
            && let Some(address) = networks.get(&guard.network.name)
        {
            let address = address.clone();
            guard.network.endpoints.push(address);
        }
        guard.containers.push(MockContainer {
            summary: ContainerSummary {
                id: id.clone(),
                name: name.to_string(),
                labels,
                state: state.to_string(),
                networks,
                created: Utc::now(),
            },
            spec: None,
            state: ContainerState {
                status: state.to_string(),
                exit_code: 0,
                error: String::new(),
            },
        });
        id
    }

    /// Record the error of a failed start on a seeded container.
    pub async fn set_last_error(&self, id: &str, exit_code: i64, error: &str) {
        let mut guard = self.state.lock().await;
        if let Some(container) = guard.containers.iter_mut().find(|c| c.summary.id == id) {
            container.state.exit_code = exit_code;
            container.state.error = error.to_string();
        }
    }

    /// All calls seen so far.
    pub async fn calls(&self) -> Vec<RuntimeCall> {
        self.state.lock().await.calls.clone()
    }

    /// Number of `create_container` calls seen so far.
    pub async fn create_count(&self) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| matches!(c, RuntimeCall::CreateContainer(_)))
            .count()
    }

    /// Current containers.
    pub async fn containers(&self) -> Vec<ContainerSummary> {
        self.state
            .lock()
            .await
            .containers
            .iter()
            .map(|c| c.summary.clone())
            .collect()
    }

    /// `ContainerSpec` a container was created from, if it was created through the mock.
    pub async fn spec_of(&self, id: &str) -> Option<ContainerSpec> {
        self.state
            .lock()
            .await
            .containers
            .iter()
            .find(|c| c.summary.id == id)
            .and_then(|c| c.spec.clone())
    }

    /// Created volumes.
    pub async fn volume(&self, name: &str) -> Option<VolumeSpec> {
        self.state.lock().await.volumes.get(name).cloned()
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn inspect_volume(&self, name: &str) -> Result<VolumeInfo, RuntimeError> {
        let mut guard = self.state.lock().await;
        guard.calls.push(RuntimeCall::InspectVolume(name.to_string()));
        guard
            .volumes
            .get(name)
            .map(|v| VolumeInfo {
                name: v.name.clone(),
                labels: v.labels.clone(),
            })
            .ok_or_else(|| RuntimeError::not_found(format!("No such volume: {}", name)))
    }

    async fn create_volume(&self, spec: &VolumeSpec) -> Result<(), RuntimeError> {
        let mut guard = self.state.lock().await;
        guard.calls.push(RuntimeCall::CreateVolume(spec.name.clone()));
        guard.volumes.insert(spec.name.clone(), spec.clone());
        Ok(())
    }

    async fn inspect_network(&self, name: &str) -> Result<NetworkInfo, RuntimeError> {
        let mut guard = self.state.lock().await;
        guard.calls.push(RuntimeCall::InspectNetwork(name.to_string()));
        if guard.network.name != name {
            return Err(RuntimeError::not_found(format!("No such network: {}", name)));
        }
        Ok(guard.network.clone())
    }

    async fn list_containers(
        &self,
        filter: &ContainerFilter,
    ) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let mut guard = self.state.lock().await;
        guard.calls.push(RuntimeCall::ListContainers);
        Ok(guard
            .containers
            .iter()
            .filter(|c| filter.matches(&c.summary))
            .map(|c| c.summary.clone())
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerState, RuntimeError> {
        let mut guard = self.state.lock().await;
        guard.calls.push(RuntimeCall::InspectContainer(id.to_string()));
        guard
            .containers
            .iter()
            .find(|c| c.summary.id == id)
            .map(|c| c.state.clone())
            .ok_or_else(|| RuntimeError::not_found(format!("No such container: {}", id)))
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let mut guard = self.state.lock().await;
        guard.calls.push(RuntimeCall::CreateContainer(spec.name.clone()));
        if let Some(error) = guard.create_failures.pop_front() {
            return Err(error);
        }
        if guard.containers.iter().any(|c| c.summary.name == spec.name) {
            return Err(RuntimeError::new(
                409,
                format!("Conflict. The container name \"/{}\" is already in use", spec.name),
            ));
        }

        guard.next_id += 1;
        let id = format!("{:064x}", guard.next_id);
        let mut networks = BTreeMap::new();
        if !spec.network.is_empty() {
            networks.insert(
                spec.network.clone(),
                spec.ipv4_address.clone().unwrap_or_default(),
            );
        }
        guard.containers.push(MockContainer {
            summary: ContainerSummary {
                id: id.clone(),
                name: spec.name.clone(),
                labels: spec.labels.clone(),
                state: "created".to_string(),
                networks,
                created: Utc::now(),
            },
            spec: Some(spec.clone()),
            state: ContainerState {
                status: "created".to_string(),
                exit_code: 0,
                error: String::new(),
            },
        });
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
        let mut guard = self.state.lock().await;
        guard.calls.push(RuntimeCall::StartContainer(id.to_string()));
        let failure = guard.start_failures.pop_front();
        let network = guard.network.name.clone();

        let container = guard
            .containers
            .iter_mut()
            .find(|c| c.summary.id == id)
            .ok_or_else(|| RuntimeError::not_found(format!("No such container: {}", id)))?;

        if let Some(error) = failure {
            container.state.exit_code = 128;
            container.state.error = error.message.clone();
            return Err(error);
        }

        container.summary.state = "running".to_string();
        container.state.status = "running".to_string();
        let address = container
            .summary
            .networks
            .get(&network)
            .filter(|a| !a.is_empty())
            .cloned();
        if let Some(address) = address {
            guard.network.endpoints.push(address);
        }
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<(), RuntimeError> {
        let mut guard = self.state.lock().await;
        guard.calls.push(RuntimeCall::RemoveContainer(id.to_string()));
        let position = guard
            .containers
            .iter()
            .position(|c| c.summary.id == id)
            .ok_or_else(|| RuntimeError::not_found(format!("No such container: {}", id)))?;
        let removed = guard.containers.remove(position);
        if removed.summary.state == "running"
            && let Some(address) = removed.summary.networks.get(&guard.network.name)
        {
            let address = address.clone();
            guard.network.endpoints.retain(|e| e != &address);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_start_leaves_created_container() {
        let runtime = MockRuntime::new("net", "10.0.0.0/24", "10.0.0.1");
        runtime
            .fail_next_start(RuntimeError::new(500, "Address already in use"))
            .await;

        let spec = ContainerSpec {
            name: "myst-1".into(),
            network: "net".into(),
            ipv4_address: Some("10.0.0.2".into()),
            ..ContainerSpec::default()
        };
        let id = runtime.create_container(&spec).await.unwrap();
        assert!(runtime.start_container(&id).await.is_err());

        let created = runtime
            .list_containers(&ContainerFilter::all().status("created"))
            .await
            .unwrap();
        assert_eq!(created.len(), 1);
        assert!(runtime.inspect_network("net").await.unwrap().endpoints.is_empty());

        runtime.start_container(&id).await.unwrap();
        assert_eq!(
            runtime.inspect_network("net").await.unwrap().endpoints,
            vec!["10.0.0.2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_name_conflict() {
        let runtime = MockRuntime::new("net", "10.0.0.0/24", "10.0.0.1");
        let spec = ContainerSpec {
            name: "dup".into(),
            ..ContainerSpec::default()
        };
        runtime.create_container(&spec).await.unwrap();
        let err = runtime.create_container(&spec).await.unwrap_err();
        assert_eq!(err.code, 409);
    }

    #[tokio::test]
    async fn test_remove_missing_container() {
        let runtime = MockRuntime::default();
        let err = runtime.remove_container("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
