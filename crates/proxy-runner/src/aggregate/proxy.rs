// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Proxy aggregate: relays joined with the chain behind them.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use super::filter::filter_and_sort_upstreams;
use crate::error::{Error, Result};
use crate::label::{Reference, ReferenceKind};
use crate::model::{
    ProviderFilter, ProxyDownstream, ProxyFilter, ProxyStatus, ProxyType, ProxyUpstream, Runner,
    RunnerFilter, RunnerRequest, RunnerService, VpnProvider,
};
use crate::outgoing::OutgoingAddress;
use crate::provider::ProviderApi;
use crate::runner::RunnerRepository;

/// Runners and providers indexed for the upstream join.
#[derive(Default)]
struct Topology<'a> {
    sessions: HashMap<&'a str, &'a Runner>,
    edges: HashMap<&'a str, &'a Runner>,
    identities: HashMap<&'a str, &'a Runner>,
    providers: HashMap<&'a str, &'a VpnProvider>,
}

impl<'a> Topology<'a> {
    fn new(runners: &'a [Runner], providers: &'a [VpnProvider]) -> Self {
        let mut topology = Topology::default();
        for runner in runners {
            match runner.service {
                RunnerService::Identity => {
                    if let Some(id) = runner.reference_id(ReferenceKind::Identity) {
                        topology.identities.insert(id, runner);
                    }
                }
                RunnerService::Session => {
                    if let Some(id) = runner.reference_id(ReferenceKind::VpnProvider) {
                        topology.sessions.insert(id, runner);
                    }
                }
                RunnerService::Edge => {
                    if let Some(id) = runner.reference_id(ReferenceKind::VpnProvider) {
                        topology.edges.insert(id, runner);
                    }
                }
                RunnerService::Relay => {}
            }
        }
        topology.providers = providers.iter().map(|p| (p.id.as_str(), p)).collect();
        topology
    }

    fn upstream(&self, relay: &Runner, listen_addr: &str) -> Option<ProxyUpstream> {
        let Some(id) = relay.reference_id(ReferenceKind::ProxyUpstream) else {
            debug!(runner_id = %relay.id, "Relay without upstream reference");
            return None;
        };
        let provider_id = relay.reference_id(ReferenceKind::VpnProvider);
        let identity = relay
            .reference_id(ReferenceKind::Identity)
            .and_then(|id| self.identities.get(id));
        let session = provider_id.and_then(|id| self.sessions.get(id));
        let edge = provider_id.and_then(|id| self.edges.get(id)).copied();
        let provider = provider_id.and_then(|id| self.providers.get(id));

        let status = match (identity, session) {
            (None, _) => ProxyStatus::Disable,
            (Some(identity), Some(session)) if identity.is_running() && session.is_running() => {
                ProxyStatus::Online
            }
            (Some(_), _) => ProxyStatus::Offline,
        };

        Some(ProxyUpstream {
            id: id.to_string(),
            listen_addr: listen_addr.to_string(),
            listen_port: relay.socket.port,
            proxy_downstream: vec![ProxyDownstream {
                id: edge
                    .and_then(|e| e.reference_id(ReferenceKind::ProxyDownstream))
                    .map(String::from),
                ref_id: provider_id.map(String::from),
                ip: provider.and_then(|p| p.ip.clone()),
                mask: provider.and_then(|p| p.mask),
                country: provider.and_then(|p| p.country.clone()),
                kind: ProxyType::Myst,
                status,
                runner: edge.cloned(),
            }],
            runner: relay.clone(),
            insert_date: relay.insert_date,
        })
    }
}

/// Proxy upstreams as seen by callers.
pub struct ProxyAggregate {
    runners: Arc<dyn RunnerRepository>,
    providers: Arc<dyn ProviderApi>,
    outgoing: Arc<dyn OutgoingAddress>,
}

impl ProxyAggregate {
    /// Create a new proxy aggregate.
    pub fn new(
        runners: Arc<dyn RunnerRepository>,
        providers: Arc<dyn ProviderApi>,
        outgoing: Arc<dyn OutgoingAddress>,
    ) -> Self {
        Self {
            runners,
            providers,
            outgoing,
        }
    }

    async fn registered_providers(&self, ref_id: Option<&str>) -> Result<Vec<VpnProvider>> {
        match ref_id {
            Some(id) => Ok(self
                .providers
                .get(id)
                .await?
                .filter(|p| p.is_register)
                .into_iter()
                .collect()),
            None => self.providers.list(&ProviderFilter::registered()).await,
        }
    }

    /// Every upstream, filtered, sorted and paged.
    pub async fn list(&self, filter: &ProxyFilter) -> Result<(Vec<ProxyUpstream>, usize)> {
        let all = RunnerFilter::default();
        let (runners, providers, listen_addr) = tokio::try_join!(
            self.runners.list(&all),
            self.registered_providers(filter.ref_id.as_deref()),
            self.outgoing.resolve(),
        )?;

        let topology = Topology::new(&runners, &providers);
        let upstreams = runners
            .iter()
            .filter(|r| r.service == RunnerService::Relay)
            .filter_map(|relay| topology.upstream(relay, &listen_addr))
            .collect();

        Ok(filter_and_sort_upstreams(upstreams, filter))
    }

    fn relay_filter(id: &str) -> RunnerFilter {
        RunnerFilter::service(RunnerService::Relay).with_reference(Reference::upstream(id))
    }

    /// Upstream by id.
    pub async fn get(&self, id: &str) -> Result<Option<ProxyUpstream>> {
        let Some(relay) = self.runners.list(&Self::relay_filter(id)).await?.into_iter().next() else {
            return Ok(None);
        };
        let provider_id = relay.reference_id(ReferenceKind::VpnProvider);
        let identity_id = relay.reference_id(ReferenceKind::Identity);

        let (mut runners, identities, provider, listen_addr) = tokio::try_join!(
            self.provider_runners(provider_id),
            self.identity_runners(identity_id),
            self.provider(provider_id),
            self.outgoing.resolve(),
        )?;

        runners.retain(|r| r.service != RunnerService::Relay);
        runners.extend(identities);
        let providers: Vec<VpnProvider> = provider.into_iter().collect();
        Ok(Topology::new(&runners, &providers).upstream(&relay, &listen_addr))
    }

    /// Publish a new upstream for a registered provider.
    ///
    /// The relay forwards to the identity runner bound to the provider's
    /// session. Without `listen_port` the relay picks the first free port.
    pub async fn create(&self, provider_id: &str, listen_port: Option<u16>) -> Result<ProxyUpstream> {
        let provider = self
            .providers
            .get(provider_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("provider {}", provider_id)))?;
        let user_identity = provider
            .user_identity
            .clone()
            .filter(|_| provider.is_register)
            .ok_or_else(|| Error::NotRunning(format!("session for provider {}", provider_id)))?;

        let (runners, identities, listen_addr) = tokio::try_join!(
            self.provider_runners(Some(provider_id)),
            self.identity_runners_by_key(&user_identity),
            self.outgoing.resolve(),
        )?;
        if runners.iter().any(|r| r.service == RunnerService::Relay) {
            return Err(Error::AlreadyExists(format!(
                "proxy upstream for provider {}",
                provider_id
            )));
        }
        let identity_id = identities
            .iter()
            .find_map(|r| r.reference_id(ReferenceKind::Identity))
            .ok_or_else(|| Error::NotRunning(format!("identity runner for {}", user_identity)))?
            .to_string();

        let upstream_id = Uuid::new_v4().to_string();
        let mut request = RunnerRequest::new(
            format!("socat-{}", user_identity),
            RunnerService::Relay,
            &[
                Reference::Identity {
                    id: Some(identity_id),
                    identity: Some(user_identity.clone()),
                    passphrase: None,
                },
                Reference::VpnProvider {
                    id: Some(provider.id.clone()),
                    user_identity: Some(user_identity.clone()),
                    provider_identity: Some(provider.provider_identity.clone()),
                },
                Reference::upstream(&upstream_id),
            ],
        );
        if let Some(port) = listen_port {
            request = request.with_port(port);
        }
        let relay = self.runners.create(&request).await?;
        info!(
            upstream_id = %upstream_id,
            provider_id = %provider_id,
            port = ?relay.socket.port,
            "Proxy upstream created"
        );

        let mut merged = runners;
        merged.extend(identities);
        let providers = [provider];
        Topology::new(&merged, &providers)
            .upstream(&relay, &listen_addr)
            .ok_or(Error::Unknown)
    }

    async fn provider_runners(&self, provider_id: Option<&str>) -> Result<Vec<Runner>> {
        match provider_id {
            Some(id) => {
                self.runners
                    .list(&RunnerFilter::reference(Reference::provider_id(id)))
                    .await
            }
            None => Ok(Vec::new()),
        }
    }

    async fn identity_runners(&self, identity_id: Option<&str>) -> Result<Vec<Runner>> {
        match identity_id {
            Some(id) => {
                let filter = RunnerFilter::service(RunnerService::Identity)
                    .with_reference(Reference::identity_id(id));
                self.runners.list(&filter).await
            }
            None => Ok(Vec::new()),
        }
    }

    async fn identity_runners_by_key(&self, identity: &str) -> Result<Vec<Runner>> {
        let filter = RunnerFilter::service(RunnerService::Identity)
            .with_reference(Reference::identity_key(identity));
        self.runners.list(&filter).await
    }

    async fn provider(&self, provider_id: Option<&str>) -> Result<Option<VpnProvider>> {
        match provider_id {
            Some(id) => self.providers.get(id).await,
            None => Ok(None),
        }
    }

    /// Remove an upstream: the edge runners of its provider, then the relay.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let relays = self.runners.list(&Self::relay_filter(id)).await?;
        let Some(relay) = relays.first() else {
            return Ok(());
        };

        if let Some(provider_id) = relay.reference_id(ReferenceKind::VpnProvider) {
            let edges = RunnerFilter::service(RunnerService::Edge)
                .with_reference(Reference::provider_id(provider_id));
            for edge in self.runners.list(&edges).await? {
                self.runners.remove(&edge.id).await?;
            }
        }
        for relay in &relays {
            self.runners.remove(&relay.id).await?;
        }

        info!(upstream_id = %id, "Proxy upstream removed");
        Ok(())
    }
}
