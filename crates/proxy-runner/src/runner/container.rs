// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runner repository over the container runtime.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::traits::{RunnerCreator, RunnerRepository};
use crate::config::{IdentityRunnerConfig, RelayRunnerConfig};
use crate::error::{Error, Result};
use crate::label::LabelCodec;
use crate::label::codec::{ID, PROJECT, PUBLISH_PORT};
use crate::model::{
    Runner, RunnerExec, RunnerFilter, RunnerRequest, RunnerService, RunnerSocket, RunnerStatus,
    SocketType,
};
use crate::runtime::{ContainerFilter, ContainerRuntime, ContainerSummary};

/// Lists managed containers as runners and dispatches creation per service.
pub struct ContainerRunnerRepository {
    runtime: Arc<dyn ContainerRuntime>,
    codec: LabelCodec,
    network: String,
    control_port: u16,
    edge_port: u16,
    creators: Vec<Arc<dyn RunnerCreator>>,
}

impl ContainerRunnerRepository {
    /// Create a repository without creators.
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        codec: LabelCodec,
        identity: &IdentityRunnerConfig,
        relay: &RelayRunnerConfig,
    ) -> Self {
        Self {
            runtime,
            codec,
            network: identity.network.clone(),
            control_port: identity.control_port,
            edge_port: relay.forward_port,
            creators: Vec::new(),
        }
    }

    /// Register a creator; a later creator for the same service wins.
    pub fn with_creator(mut self, creator: Arc<dyn RunnerCreator>) -> Self {
        self.creators.retain(|c| c.service() != creator.service());
        self.creators.push(creator);
        self
    }

    fn container_filter(&self, filter: &RunnerFilter) -> ContainerFilter {
        let mut container_filter = match &filter.service {
            Some(service) => ContainerFilter::all().label(self.codec.key(PROJECT), service.project()),
            None => ContainerFilter::all().label_key(self.codec.key(PROJECT)),
        };
        if let Some(name) = &filter.name {
            container_filter = container_filter.name(name.clone());
        }
        container_filter.labels(&self.codec.flatten(&filter.references, &["passphrase"]))
    }

    /// Convert a container into a runner; containers of unknown services yield `None`.
    pub fn to_runner(&self, container: &ContainerSummary) -> Option<Runner> {
        let project = container.labels.get(&self.codec.key(PROJECT))?;
        let Some(service) = RunnerService::from_project(project) else {
            debug!(container = %container.id, project = %project, "Skipping container of unknown service");
            return None;
        };

        let address = container.networks.get(&self.network).cloned();
        let socket = match service {
            RunnerService::Identity => RunnerSocket {
                kind: SocketType::Http,
                uri: address,
                port: Some(self.control_port),
            },
            RunnerService::Session => RunnerSocket::none(),
            RunnerService::Relay => RunnerSocket {
                kind: SocketType::Tcp,
                uri: None,
                port: container
                    .labels
                    .get(&self.codec.key(PUBLISH_PORT))
                    .and_then(|p| p.parse().ok()),
            },
            RunnerService::Edge => RunnerSocket {
                kind: SocketType::Http,
                uri: address,
                port: Some(self.edge_port),
            },
        };

        Some(Runner {
            id: container
                .labels
                .get(&self.codec.key(ID))
                .cloned()
                .unwrap_or_else(|| container.id.clone()),
            serial: container.id.clone(),
            name: container.name.clone(),
            service,
            exec: RunnerExec::Docker,
            socket,
            label: self.codec.structure(&container.labels),
            volumes: Vec::new(),
            status: RunnerStatus::from_state(&container.state),
            insert_date: container.created,
        })
    }
}

#[async_trait]
impl RunnerRepository for ContainerRunnerRepository {
    async fn list(&self, filter: &RunnerFilter) -> Result<Vec<Runner>> {
        let containers = self
            .runtime
            .list_containers(&self.container_filter(filter))
            .await?;
        Ok(containers.iter().filter_map(|c| self.to_runner(c)).collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Runner>> {
        let filter = ContainerFilter::all().label(self.codec.key(ID), id);
        let containers = self.runtime.list_containers(&filter).await?;
        Ok(containers.iter().find_map(|c| self.to_runner(c)))
    }

    async fn create(&self, request: &RunnerRequest) -> Result<Runner> {
        let creator = self
            .creators
            .iter()
            .find(|c| c.service() == request.service)
            .ok_or_else(|| Error::NotFound(format!("runner creator for {}", request.service)))?;
        creator.create(request).await
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let filter = ContainerFilter::all().label(self.codec.key(ID), id);
        for container in self.runtime.list_containers(&filter).await? {
            match self.runtime.remove_container(&container.id).await {
                Ok(()) => info!(runner_id = %id, serial = %container.id, "Runner removed"),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
