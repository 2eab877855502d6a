// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Identity aggregate: rows joined with key files and runners.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::keyfile::KeyFileStore;
use crate::label::Reference;
use crate::model::{
    Identity, IdentityFilter, NewIdentity, Runner, RunnerFilter, RunnerRequest, RunnerService,
    RunnerVolume, VolumeRole,
};
use crate::runner::RunnerRepository;
use crate::store::IdentityStore;

/// Identities as seen by callers.
pub struct IdentityAggregate {
    store: Arc<dyn IdentityStore>,
    keyfiles: Arc<dyn KeyFileStore>,
    runners: Arc<dyn RunnerRepository>,
    ready_attempts: u32,
    ready_interval: Duration,
}

fn identity_runners(identity: &str) -> RunnerFilter {
    RunnerFilter::service(RunnerService::Identity).with_reference(Reference::identity_key(identity))
}

fn sessions_of(identity: &str) -> RunnerFilter {
    RunnerFilter::service(RunnerService::Session).with_reference(Reference::provider_user(identity))
}

fn split(file: &Path) -> (String, String) {
    let path = file
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let filename = file
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    (path, filename)
}

/// Poll `host:port` until it accepts a connection; false after `attempts` failed connects.
pub(crate) async fn wait_until_reachable(
    host: &str,
    port: u16,
    attempts: u32,
    interval: Duration,
) -> bool {
    for attempt in 1..=attempts {
        if let Ok(Ok(_)) = tokio::time::timeout(interval, TcpStream::connect((host, port))).await {
            return true;
        }
        debug!(host, port, attempt, "Identity control port not reachable yet");
        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }
    false
}

impl IdentityAggregate {
    /// Create a new identity aggregate.
    pub fn new(
        store: Arc<dyn IdentityStore>,
        keyfiles: Arc<dyn KeyFileStore>,
        runners: Arc<dyn RunnerRepository>,
    ) -> Self {
        Self {
            store,
            keyfiles,
            runners,
            ready_attempts: 0,
            ready_interval: Duration::ZERO,
        }
    }

    /// Wait for the control port of a newly added identity runner.
    pub fn with_readiness(mut self, attempts: u32, interval: Duration) -> Self {
        self.ready_attempts = attempts;
        self.ready_interval = interval;
        self
    }

    /// Identities with a key file, filtered and paged.
    pub async fn list(&self, filter: &IdentityFilter) -> Result<(Vec<Identity>, usize)> {
        let session_filter = RunnerFilter::service(RunnerService::Session);
        let (files, rows, sessions) = tokio::try_join!(
            self.keyfiles.list(),
            self.store.list(filter.identity.as_deref()),
            self.runners.list(&session_filter),
        )?;
        if files.is_empty() || rows.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let files: HashMap<String, &PathBuf> = files
            .iter()
            .filter_map(|f| Some((f.file_stem()?.to_string_lossy().into_owned(), f)))
            .collect();

        let identities = rows
            .into_iter()
            .filter_map(|mut row| {
                let file = files.get(&row.identity)?;
                (row.path, row.filename) = split(file);
                row.is_use = sessions.iter().any(|s| {
                    s.label
                        .iter()
                        .any(|r| r.get("userIdentity") == Some(row.identity.as_str()))
                });
                Some(row)
            })
            .filter(|row| filter.is_use.is_none_or(|is_use| row.is_use == is_use))
            .collect();

        Ok(filter.pagination.apply(identities))
    }

    /// Identity by id; only identities with a key file and a running runner.
    pub async fn get(&self, id: Uuid) -> Result<Option<Identity>> {
        let Some(mut row) = self.store.get(id).await? else {
            return Ok(None);
        };

        let runner_filter = identity_runners(&row.identity);
        let session_filter = sessions_of(&row.identity);
        let (file, runners, sessions) = tokio::try_join!(
            self.keyfiles.find_in_dir(Path::new(&row.path)),
            self.runners.list(&runner_filter),
            self.runners.list(&session_filter),
        )?;
        let Some(file) = file else {
            return Ok(None);
        };
        if !runners.iter().any(|r| r.is_running()) {
            return Ok(None);
        }

        (row.path, row.filename) = split(&file);
        row.is_use = !sessions.is_empty();
        Ok(Some(row))
    }

    /// Register a key file and start its identity runner.
    pub async fn add(&self, new: &NewIdentity) -> Result<Identity> {
        let identity = self.keyfiles.read_identity(&new.key_file).await?;
        if !self.store.list(Some(&identity)).await?.is_empty() {
            return Err(Error::AlreadyExists(format!("identity {}", identity)));
        }

        let file = self.keyfiles.move_and_rename(&new.key_file, &identity).await?;
        let (path, filename) = split(&file);
        let row = Identity {
            id: Uuid::new_v4(),
            identity: identity.clone(),
            passphrase: new.passphrase.clone(),
            path,
            filename,
            is_use: false,
            insert_date: Utc::now(),
        };

        let row = match self.store.add(&row).await {
            Ok(row) => row,
            Err(Error::AlreadyExists(what)) => self
                .store
                .list(Some(&identity))
                .await?
                .into_iter()
                .next()
                .ok_or(Error::AlreadyExists(what))?,
            Err(e) => return Err(e),
        };

        if self.runners.list(&identity_runners(&identity)).await?.is_empty() {
            let request = RunnerRequest::new(
                format!("myst-{}", identity),
                RunnerService::Identity,
                &[Reference::Identity {
                    id: Some(row.id.to_string()),
                    identity: Some(identity.clone()),
                    passphrase: Some(row.passphrase.clone()),
                }],
            )
            .with_volume(RunnerVolume {
                role: Some(VolumeRole::Keystore),
                source: row.path.clone(),
                dest: "-".to_string(),
            });

            let runner = match self.runners.create(&request).await {
                Ok(runner) => runner,
                Err(e) => {
                    self.remove_runners(&identity_runners(&identity)).await;
                    return Err(e);
                }
            };
            self.wait_ready(&runner).await;
        }

        info!(identity = %identity, id = %row.id, "Identity added");
        Ok(row)
    }

    /// Remove an identity: its runner, key file and row.
    ///
    /// Identities bound to a session are refused with `InUse`. When the row
    /// is already gone, runners still labelled with the id are removed.
    pub async fn remove(&self, id: Uuid) -> Result<()> {
        let Some(row) = self.store.get(id).await? else {
            let filter = RunnerFilter::service(RunnerService::Identity)
                .with_reference(Reference::identity_id(id.to_string()));
            for runner in self.runners.list(&filter).await? {
                self.runners.remove(&runner.id).await?;
            }
            return Ok(());
        };

        if !self.runners.list(&sessions_of(&row.identity)).await?.is_empty() {
            return Err(Error::InUse(format!("identity {}", row.identity)));
        }

        for runner in self.runners.list(&identity_runners(&row.identity)).await? {
            self.runners.remove(&runner.id).await?;
        }
        self.keyfiles.remove(&row.key_file()).await?;
        self.store.remove(id).await?;

        info!(identity = %row.identity, id = %id, "Identity removed");
        Ok(())
    }

    async fn wait_ready(&self, runner: &Runner) {
        if self.ready_attempts == 0 {
            return;
        }
        let (Some(host), Some(port)) = (runner.socket.uri.as_deref(), runner.socket.port) else {
            return;
        };
        if !wait_until_reachable(host, port, self.ready_attempts, self.ready_interval).await {
            warn!(
                runner_id = %runner.id,
                host,
                port,
                attempts = self.ready_attempts,
                "Identity runner control port still unreachable"
            );
        }
    }

    async fn remove_runners(&self, filter: &RunnerFilter) {
        let runners = match self.runners.list(filter).await {
            Ok(runners) => runners,
            Err(e) => {
                warn!(error = %e, "Failed to list runners for cleanup");
                return;
            }
        };
        for runner in runners {
            if let Err(e) = self.runners.remove(&runner.id).await {
                warn!(runner_id = %runner.id, error = %e, "Failed to remove runner during cleanup");
            }
        }
    }
}
