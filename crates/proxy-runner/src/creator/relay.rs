// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Relay runner creator.
//!
//! A relay publishes a host port and forwards it into the network namespace
//! of a running identity container. Callers either ask for a specific port,
//! which is used as-is and never retried, or let the creator pick the first
//! port no other relay publishes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::allocate::next_free_port;
use super::{AUTOHEAL, LOCALTIME_BIND, LaunchFailure, discard, launch};
use crate::config::{RelayRunnerConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::label::codec::{CREATE_BY, ID, PROJECT, PUBLISH_PORT};
use crate::label::{
    IdentityRef, LabelCodec, ProxyUpstreamRef, Reference, ReferenceKind, VpnProviderRef, decode,
    find, materialize,
};
use crate::model::{
    Runner, RunnerExec, RunnerRequest, RunnerService, RunnerSocket, RunnerStatus, SocketType,
};
use crate::runner::RunnerCreator;
use crate::runtime::{ContainerFilter, ContainerRuntime, ContainerSpec};

/// Creates RELAY runners.
pub struct RelayRunnerCreator {
    runtime: Arc<dyn ContainerRuntime>,
    codec: LabelCodec,
    config: RelayRunnerConfig,
    retry: RetryConfig,
}

/// Ids taken from a validated request.
struct Chain {
    identity_id: String,
    provider: VpnProviderRef,
    upstream_id: String,
}

impl Chain {
    /// References carried by the created runner.
    fn references(&self) -> Vec<Reference> {
        let optional = |value: &str| (!value.is_empty()).then(|| value.to_string());
        vec![
            Reference::identity_id(&self.identity_id),
            Reference::VpnProvider {
                id: Some(self.provider.id.clone()),
                user_identity: optional(&self.provider.user_identity),
                provider_identity: optional(&self.provider.provider_identity),
            },
            Reference::upstream(&self.upstream_id),
        ]
    }
}

impl RelayRunnerCreator {
    /// Create a new relay runner creator.
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        codec: LabelCodec,
        config: RelayRunnerConfig,
        retry: RetryConfig,
    ) -> Self {
        Self {
            runtime,
            codec,
            config,
            retry,
        }
    }

    /// Address of the running identity container on the managed network.
    async fn identity_address(&self, identity: &Reference) -> Result<String> {
        let filter = ContainerFilter::running()
            .label(self.codec.key(PROJECT), RunnerService::Identity.project())
            .labels(&self.codec.flatten_selected(identity, &["id", "identity"]));
        let containers = self.runtime.list_containers(&filter).await?;

        containers
            .first()
            .and_then(|c| c.networks.get(&self.config.network))
            .filter(|address| !address.is_empty())
            .cloned()
            .ok_or_else(|| {
                Error::NotRunning(format!(
                    "identity runner for {}",
                    identity.id().unwrap_or_default()
                ))
            })
    }

    /// Remove same-name containers, restricted to one state when given.
    async fn remove_named(&self, name: &str, state: Option<&str>) -> Result<()> {
        let mut filter = ContainerFilter::all().name(name);
        if let Some(state) = state {
            filter = filter.status(state);
        }
        for container in self.runtime.list_containers(&filter).await? {
            if let Ok(last) = self.runtime.inspect_container(&container.id).await {
                debug!(
                    container = %container.id,
                    status = %last.status,
                    exit_code = last.exit_code,
                    error = %last.error,
                    "Removing previous relay container"
                );
            }
            match self.runtime.remove_container(&container.id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Ports already published by relay containers.
    async fn occupied_ports(&self) -> Result<BTreeSet<u16>> {
        let filter = ContainerFilter::all()
            .label(self.codec.key(PROJECT), RunnerService::Relay.project())
            .label_key(self.codec.key(PUBLISH_PORT));
        let publish_port = self.codec.key(PUBLISH_PORT);
        Ok(self
            .runtime
            .list_containers(&filter)
            .await?
            .iter()
            .filter_map(|c| c.labels.get(&publish_port).and_then(|p| p.parse().ok()))
            .collect())
    }

    fn container_spec(
        &self,
        name: &str,
        runner_id: &str,
        identity_address: &str,
        port: u16,
        references: &[Reference],
    ) -> ContainerSpec {
        let mut labels: BTreeMap<String, String> = self.codec.flatten(references, &["passphrase"]);
        labels.insert(self.codec.key(ID), runner_id.to_string());
        labels.insert(
            self.codec.key(PROJECT),
            RunnerService::Relay.project().to_string(),
        );
        labels.insert(self.codec.key(CREATE_BY), "api".to_string());
        labels.insert(self.codec.key(PUBLISH_PORT), port.to_string());
        labels.insert(AUTOHEAL.to_string(), "true".to_string());

        ContainerSpec {
            name: name.to_string(),
            image: self.config.image.clone(),
            cmd: vec![
                format!("TCP-LISTEN:{},fork", self.config.internal_port),
                format!("TCP:{}:{}", identity_address, self.config.forward_port),
            ],
            env: Vec::new(),
            labels,
            binds: vec![LOCALTIME_BIND.to_string()],
            network: self.config.network.clone(),
            ipv4_address: None,
            cap_add: Vec::new(),
            devices: Vec::new(),
            port_bindings: vec![(self.config.internal_port, port)],
            restart_always: true,
        }
    }

    fn runner(&self, request: &RunnerRequest, runner_id: String, serial: String, port: u16, chain: &Chain) -> Runner {
        Runner {
            id: runner_id,
            serial,
            name: request.name.clone(),
            service: RunnerService::Relay,
            exec: RunnerExec::Docker,
            socket: RunnerSocket {
                kind: SocketType::Tcp,
                uri: None,
                port: Some(port),
            },
            label: chain.references(),
            volumes: Vec::new(),
            status: RunnerStatus::Running,
            insert_date: Utc::now(),
        }
    }

    async fn fail(&self, failure: LaunchFailure) -> Error {
        if let Some(container) = &failure.container {
            discard(self.runtime.as_ref(), container).await;
        }
        failure.error.into()
    }
}

#[async_trait]
impl RunnerCreator for RelayRunnerCreator {
    fn service(&self) -> RunnerService {
        RunnerService::Relay
    }

    async fn create(&self, request: &RunnerRequest) -> Result<Runner> {
        let references = decode(&request.label)?;
        let identity = materialize::<IdentityRef>(&references)?;
        let provider = materialize::<VpnProviderRef>(&references)?;
        let upstream = materialize::<ProxyUpstreamRef>(&references)?;
        identity.require(&["id"])?;
        provider.require(&["id"])?;
        upstream.require(&["id"])?;

        let chain = Chain {
            identity_id: identity.id.clone(),
            provider: provider.into_inner(),
            upstream_id: upstream.id.clone(),
        };

        let identity_reference = find(&references, ReferenceKind::Identity)
            .ok_or_else(|| Error::NotFound(ReferenceKind::Identity.namespace().to_string()))?;
        let identity_address = self.identity_address(identity_reference).await?;
        let runner_id = Uuid::new_v4().to_string();

        if let Some(port) = request.socket_port {
            self.remove_named(&request.name, None).await?;
            let spec = self.container_spec(&request.name, &runner_id, &identity_address, port, &references);
            return match launch(self.runtime.as_ref(), &spec).await {
                Ok(serial) => {
                    info!(name = %request.name, container = %serial, port, "Relay runner started");
                    Ok(self.runner(request, runner_id, serial, port, &chain))
                }
                Err(failure) if failure.error.is_port_allocated() => {
                    warn!(name = %request.name, port, "Requested relay port already allocated");
                    self.fail(failure).await;
                    Err(Error::PortInUse(port))
                }
                Err(failure) => Err(self.fail(failure).await),
            };
        }

        self.remove_named(&request.name, Some("created")).await?;

        let mut failed: BTreeSet<u16> = BTreeSet::new();
        let mut last_port = self.config.start_port;
        for attempt in 1..=self.retry.max_attempts {
            let mut excluded = self.occupied_ports().await?;
            excluded.extend(failed.iter().copied());
            let port = next_free_port(self.config.start_port, &excluded)
                .ok_or(Error::PortInUse(last_port))?;
            last_port = port;
            debug!(name = %request.name, port, attempt, "Picked relay port");

            let spec = self.container_spec(&request.name, &runner_id, &identity_address, port, &references);
            match launch(self.runtime.as_ref(), &spec).await {
                Ok(serial) => {
                    info!(name = %request.name, container = %serial, port, "Relay runner started");
                    return Ok(self.runner(request, runner_id, serial, port, &chain));
                }
                Err(failure) if failure.error.is_port_allocated() => {
                    warn!(
                        name = %request.name,
                        port,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        "Relay port already allocated"
                    );
                    self.fail(failure).await;
                    failed.insert(port);
                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.backoff()).await;
                    }
                }
                Err(failure) => return Err(self.fail(failure).await),
            }
        }

        Err(Error::PortInUse(last_port))
    }
}
