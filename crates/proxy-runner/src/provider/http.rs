// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provider catalog over the node's proposals API.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use super::ProviderApi;
use crate::error::Result;
use crate::model::{ProviderFilter, ProviderIpType, VpnProvider};

const SERVICE_TYPE: &str = "wireguard";

#[derive(Debug, Deserialize)]
struct Proposal {
    provider_id: String,
    #[serde(default)]
    location: Location,
    #[serde(default)]
    quality: Quality,
}

#[derive(Debug, Default, Deserialize)]
struct Location {
    country: Option<String>,
    ip_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Quality {
    quality: Option<f64>,
    bandwidth: Option<f64>,
    latency: Option<f64>,
}

/// Stable provider id derived from the provider identity.
pub fn provider_id(provider_identity: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, provider_identity.as_bytes()).to_string()
}

impl From<Proposal> for VpnProvider {
    fn from(proposal: Proposal) -> Self {
        VpnProvider {
            id: provider_id(&proposal.provider_id),
            user_identity: None,
            provider_identity: proposal.provider_id,
            service_type: SERVICE_TYPE.to_string(),
            ip_type: proposal
                .location
                .ip_type
                .as_deref()
                .and_then(ProviderIpType::parse),
            country: proposal.location.country,
            ip: None,
            mask: None,
            quality: proposal.quality.quality,
            bandwidth: proposal.quality.bandwidth,
            latency: proposal.quality.latency,
            is_register: false,
            insert_date: Utc::now(),
        }
    }
}

/// Provider catalog served by a node's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpProviderApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProviderApi {
    /// Catalog at `base_url` (e.g. `http://127.0.0.1:4050`).
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn proposals(&self, country: Option<&str>) -> Result<Vec<VpnProvider>> {
        let mut query = vec![("service_type", SERVICE_TYPE)];
        if let Some(country) = country {
            query.push(("location_country", country));
        }

        let proposals: Option<Vec<Proposal>> = self
            .client
            .get(format!("{}/api/v3/proposals", self.base_url))
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let providers: Vec<VpnProvider> = proposals
            .unwrap_or_default()
            .into_iter()
            .map(VpnProvider::from)
            .collect();
        debug!(count = providers.len(), "Fetched provider proposals");
        Ok(providers)
    }
}

#[async_trait]
impl ProviderApi for HttpProviderApi {
    async fn list(&self, filter: &ProviderFilter) -> Result<Vec<VpnProvider>> {
        let providers = self.proposals(filter.country.as_deref()).await?;
        Ok(providers
            .into_iter()
            .filter(|p| filter.is_register.is_none_or(|r| p.is_register == r))
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<VpnProvider>> {
        let mut matches: Vec<VpnProvider> = self
            .proposals(None)
            .await?
            .into_iter()
            .filter(|p| p.id == id)
            .collect();
        Ok(if matches.len() == 1 { matches.pop() } else { None })
    }
}
