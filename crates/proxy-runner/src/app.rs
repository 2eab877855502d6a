// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Component wiring.

use std::sync::Arc;

use crate::aggregate::{IdentityAggregate, ProxyAggregate};
use crate::config::Config;
use crate::creator::{IdentityRunnerCreator, RelayRunnerCreator};
use crate::keyfile::{FsKeyFileStore, KeyFileStore};
use crate::label::LabelCodec;
use crate::outgoing::OutgoingAddress;
use crate::provider::{ProviderApi, RegisteredProviderApi};
use crate::runner::{ContainerRunnerRepository, RunnerRepository};
use crate::runtime::ContainerRuntime;
use crate::store::IdentityStore;

/// Fully wired proxy runner.
pub struct ProxyRunner {
    runners: Arc<dyn RunnerRepository>,
    identities: IdentityAggregate,
    proxies: ProxyAggregate,
}

impl ProxyRunner {
    /// Wire every component from configuration and the external collaborators.
    ///
    /// `providers` is the raw catalog; registration state is layered on top.
    pub fn new(
        config: &Config,
        runtime: Arc<dyn ContainerRuntime>,
        store: Arc<dyn IdentityStore>,
        providers: Arc<dyn ProviderApi>,
        outgoing: Arc<dyn OutgoingAddress>,
    ) -> Self {
        let codec = LabelCodec::new(&config.label_namespace);

        let identity_creator = IdentityRunnerCreator::new(
            runtime.clone(),
            codec.clone(),
            config.identity.clone(),
            config.retry.clone(),
        );
        let relay_creator = RelayRunnerCreator::new(
            runtime.clone(),
            codec.clone(),
            config.relay.clone(),
            config.retry.clone(),
        );
        let runners: Arc<dyn RunnerRepository> = Arc::new(
            ContainerRunnerRepository::new(runtime, codec, &config.identity, &config.relay)
                .with_creator(Arc::new(identity_creator))
                .with_creator(Arc::new(relay_creator)),
        );

        let keyfiles: Arc<dyn KeyFileStore> =
            Arc::new(FsKeyFileStore::new(config.identity.keystore_dir.clone()));
        let providers: Arc<dyn ProviderApi> =
            Arc::new(RegisteredProviderApi::new(providers, runners.clone()));

        Self {
            identities: IdentityAggregate::new(store, keyfiles, runners.clone()).with_readiness(
                config.identity.ready_attempts,
                config.identity.ready_interval,
            ),
            proxies: ProxyAggregate::new(runners.clone(), providers, outgoing),
            runners,
        }
    }

    /// Runner repository.
    pub fn runners(&self) -> &Arc<dyn RunnerRepository> {
        &self.runners
    }

    /// Identity aggregate.
    pub fn identities(&self) -> &IdentityAggregate {
        &self.identities
    }

    /// Proxy aggregate.
    pub fn proxies(&self) -> &ProxyAggregate {
        &self.proxies
    }
}
