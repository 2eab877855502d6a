// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! VPN provider catalog.

mod http;
mod registered;

pub use http::{HttpProviderApi, provider_id};
pub use registered::RegisteredProviderApi;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{ProviderFilter, VpnProvider};

/// Read access to VPN providers.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// Providers matching the filter.
    async fn list(&self, filter: &ProviderFilter) -> Result<Vec<VpnProvider>>;

    /// Provider by id.
    async fn get(&self, id: &str) -> Result<Option<VpnProvider>>;
}

/// Fixed provider list.
#[derive(Debug, Clone, Default)]
pub struct StaticProviderApi {
    providers: Vec<VpnProvider>,
}

impl StaticProviderApi {
    /// Catalog returning `providers`.
    pub fn new(providers: Vec<VpnProvider>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl ProviderApi for StaticProviderApi {
    async fn list(&self, filter: &ProviderFilter) -> Result<Vec<VpnProvider>> {
        Ok(self
            .providers
            .iter()
            .filter(|p| filter.is_register.is_none_or(|r| p.is_register == r))
            .filter(|p| {
                filter
                    .country
                    .as_ref()
                    .is_none_or(|c| p.country.as_ref() == Some(c))
            })
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<VpnProvider>> {
        Ok(self.providers.iter().find(|p| p.id == id).cloned())
    }
}
