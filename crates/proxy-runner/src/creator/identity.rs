// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Identity runner creator.
//!
//! Provisions the VPN client container that holds an identity's keystore.
//! The container gets a static address on the managed network; when two
//! creators race for the same address the loser backs off and retries.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::allocate::first_free_address;
use super::{AUTOHEAL, LOCALTIME_BIND, discard, launch};
use crate::config::{IdentityRunnerConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::label::codec::{CREATE_BY, ID, PROJECT};
use crate::label::{IdentityRef, LabelCodec, Reference, ReferenceKind, decode, materialize};
use crate::model::{
    Runner, RunnerExec, RunnerRequest, RunnerService, RunnerSocket, RunnerStatus, RunnerVolume,
    SocketType, VolumeRole,
};
use crate::runner::RunnerCreator;
use crate::runtime::{ContainerFilter, ContainerRuntime, ContainerSpec, VolumeSpec};

const CREATED_BY: &str = "api";

/// Creates IDENTITY runners.
pub struct IdentityRunnerCreator {
    runtime: Arc<dyn ContainerRuntime>,
    codec: LabelCodec,
    config: IdentityRunnerConfig,
    retry: RetryConfig,
}

impl IdentityRunnerCreator {
    /// Create a new identity runner creator.
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        codec: LabelCodec,
        config: IdentityRunnerConfig,
        retry: RetryConfig,
    ) -> Self {
        Self {
            runtime,
            codec,
            config,
            retry,
        }
    }

    /// Keystore volume name for an identity.
    pub fn volume_name(identity: &str) -> String {
        format!("myst-keystore-{}", identity)
    }

    /// Host path of a keystore directory as seen by the runtime.
    fn host_path(&self, source: &str) -> Result<PathBuf> {
        let source = std::path::absolute(source)?;
        if let Some(host_dir) = &self.config.host_keystore_dir {
            let base = std::path::absolute(&self.config.keystore_dir)?;
            if let Ok(rest) = source.strip_prefix(&base) {
                return Ok(host_dir.join(rest));
            }
        }
        Ok(source)
    }

    async fn ensure_volume(
        &self,
        name: &str,
        device: &Path,
        references: &[Reference],
    ) -> Result<()> {
        match self.runtime.inspect_volume(name).await {
            Ok(_) => return Ok(()),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let mut labels = self
            .codec
            .scoped("volume")
            .flatten(references, &["passphrase"]);
        labels.insert(self.codec.key(CREATE_BY), CREATED_BY.to_string());

        self.runtime
            .create_volume(&VolumeSpec {
                name: name.to_string(),
                device: device.display().to_string(),
                labels,
            })
            .await?;
        info!(volume = %name, device = %device.display(), "Keystore volume created");
        Ok(())
    }

    /// Remove the container a previous failed attempt left in `created` state.
    async fn remove_stale(&self, references: &[Reference]) -> Result<()> {
        let filter = ContainerFilter::all()
            .status("created")
            .label(self.codec.key(PROJECT), RunnerService::Identity.project())
            .labels(&self.codec.flatten(references, &["id", "passphrase"]));
        let stale = self.runtime.list_containers(&filter).await?;
        if let [container] = stale.as_slice() {
            debug!(container = %container.id, "Removing stale identity container");
            match self.runtime.remove_container(&container.id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn labels(&self, runner_id: &str, references: &[Reference]) -> BTreeMap<String, String> {
        let mut labels = self.codec.flatten(references, &["passphrase"]);
        labels.insert(self.codec.key(ID), runner_id.to_string());
        labels.insert(
            self.codec.key(PROJECT),
            RunnerService::Identity.project().to_string(),
        );
        labels.insert(self.codec.key(CREATE_BY), CREATED_BY.to_string());
        labels.insert(AUTOHEAL.to_string(), "true".to_string());
        labels
    }

    fn container_spec(
        &self,
        name: &str,
        identity: &IdentityRef,
        volume: &str,
        address: String,
        labels: BTreeMap<String, String>,
    ) -> ContainerSpec {
        ContainerSpec {
            name: name.to_string(),
            image: self.config.image.clone(),
            cmd: [
                "--auto-reconnect",
                "--log-level",
                "fatal",
                "service",
                "--agreed-terms-and-conditions",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            env: vec![
                format!("MYST_IDENTITY={}", identity.identity),
                format!("MYST_IDENTITY_PASS={}", identity.passphrase),
            ],
            labels,
            binds: vec![
                LOCALTIME_BIND.to_string(),
                format!("{}:{}", volume, self.config.data_volume_path),
            ],
            network: self.config.network.clone(),
            ipv4_address: Some(address),
            cap_add: vec!["NET_ADMIN".to_string()],
            devices: vec!["/dev/net/tun".to_string()],
            port_bindings: Vec::new(),
            restart_always: true,
        }
    }
}

#[async_trait]
impl RunnerCreator for IdentityRunnerCreator {
    fn service(&self) -> RunnerService {
        RunnerService::Identity
    }

    async fn create(&self, request: &RunnerRequest) -> Result<Runner> {
        let references = decode(&request.label)?;
        let filled = materialize::<IdentityRef>(&references)?;
        let identity = filled.require(&["id", "identity", "passphrase"])?;

        let keystore = request
            .volume(VolumeRole::Keystore)
            .ok_or_else(|| Error::MissingField("volumes".to_string()))?;
        let device = self.host_path(&keystore.source)?;
        let volume = Self::volume_name(&identity.identity);
        self.ensure_volume(&volume, &device, &references).await?;

        let runner_id = Uuid::new_v4().to_string();
        let labels = self.labels(&runner_id, &references);

        let mut fatal: Option<Error> = None;
        let mut leftover: Option<String> = None;

        for attempt in 1..=self.retry.max_attempts {
            self.remove_stale(&references).await?;

            let network = self.runtime.inspect_network(&self.config.network).await?;
            let address = first_free_address(&network)?.to_string();
            debug!(identity = %identity.identity, address = %address, attempt, "Allocated identity address");

            let spec = self.container_spec(&request.name, identity, &volume, address.clone(), labels.clone());
            match launch(self.runtime.as_ref(), &spec).await {
                Ok(serial) => {
                    info!(
                        identity = %identity.identity,
                        container = %serial,
                        address = %address,
                        "Identity runner started"
                    );

                    let mut label = self.codec.structure(&labels);
                    if let Some(reference) = label.iter_mut().find(|r| r.kind() == ReferenceKind::Identity) {
                        reference.set("passphrase", identity.passphrase.clone());
                    }

                    return Ok(Runner {
                        id: runner_id,
                        serial,
                        name: request.name.clone(),
                        service: RunnerService::Identity,
                        exec: RunnerExec::Docker,
                        socket: RunnerSocket {
                            kind: SocketType::Http,
                            uri: Some(address),
                            port: Some(self.config.control_port),
                        },
                        label,
                        volumes: vec![RunnerVolume {
                            role: Some(VolumeRole::Keystore),
                            source: device.display().to_string(),
                            dest: self.config.data_volume_path.clone(),
                        }],
                        status: RunnerStatus::Running,
                        insert_date: Utc::now(),
                    });
                }
                Err(failure) if failure.error.is_address_in_use() => {
                    leftover = failure.container;
                    warn!(
                        identity = %identity.identity,
                        address = %address,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        "Identity address already in use"
                    );
                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.backoff()).await;
                    }
                }
                Err(failure) => {
                    leftover = failure.container;
                    fatal = Some(failure.error.into());
                    break;
                }
            }
        }

        if let Some(container) = leftover {
            discard(self.runtime.as_ref(), &container).await;
        }
        Err(fatal.unwrap_or(Error::Unknown))
    }
}
