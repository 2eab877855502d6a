// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provider catalog enriched with session registration.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::ProviderApi;
use crate::error::Result;
use crate::label::{Reference, ReferenceKind};
use crate::model::{ProviderFilter, Runner, RunnerFilter, RunnerService, VpnProvider};
use crate::runner::RunnerRepository;

/// Marks providers that have a SESSION runner bound to them.
///
/// `is_register` and `user_identity` are taken from the session runner's
/// VpnProvider reference; the `is_register` filter is applied afterwards.
pub struct RegisteredProviderApi {
    inner: Arc<dyn ProviderApi>,
    runners: Arc<dyn RunnerRepository>,
}

impl RegisteredProviderApi {
    /// Wrap a provider catalog.
    pub fn new(inner: Arc<dyn ProviderApi>, runners: Arc<dyn RunnerRepository>) -> Self {
        Self { inner, runners }
    }

    fn sessions(runners: &[Runner]) -> HashMap<String, Option<String>> {
        runners
            .iter()
            .filter_map(|runner| match runner.reference(ReferenceKind::VpnProvider)? {
                Reference::VpnProvider {
                    id: Some(id),
                    user_identity,
                    ..
                } => Some((id.clone(), user_identity.clone())),
                _ => None,
            })
            .collect()
    }

    fn mark(mut provider: VpnProvider, sessions: &HashMap<String, Option<String>>) -> VpnProvider {
        if let Some(user_identity) = sessions.get(&provider.id) {
            provider.is_register = true;
            provider.user_identity = user_identity.clone();
        }
        provider
    }
}

#[async_trait]
impl ProviderApi for RegisteredProviderApi {
    async fn list(&self, filter: &ProviderFilter) -> Result<Vec<VpnProvider>> {
        let upstream_filter = ProviderFilter {
            is_register: None,
            ..filter.clone()
        };
        let session_filter = RunnerFilter::service(RunnerService::Session);
        let (providers, sessions) = tokio::try_join!(
            self.inner.list(&upstream_filter),
            self.runners.list(&session_filter),
        )?;

        let sessions = Self::sessions(&sessions);
        Ok(providers
            .into_iter()
            .map(|p| Self::mark(p, &sessions))
            .filter(|p| filter.is_register.is_none_or(|r| p.is_register == r))
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<VpnProvider>> {
        let session_filter =
            RunnerFilter::service(RunnerService::Session).with_reference(Reference::provider_id(id));
        let (provider, sessions) = tokio::try_join!(
            self.inner.get(id),
            self.runners.list(&session_filter),
        )?;
        let sessions = Self::sessions(&sessions);
        Ok(provider.map(|p| Self::mark(p, &sessions)))
    }
}
