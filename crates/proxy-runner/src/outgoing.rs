// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Public address of this host.

use async_trait::async_trait;
use futures::future::select_ok;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Resolves the address relays are reachable at.
#[async_trait]
pub trait OutgoingAddress: Send + Sync {
    /// Public IP of this host.
    async fn resolve(&self) -> Result<String>;
}

/// Fixed address, typically from configuration.
#[derive(Debug, Clone)]
pub struct StaticOutgoingAddress(
    /// Address returned by every call.
    pub String,
);

#[async_trait]
impl OutgoingAddress for StaticOutgoingAddress {
    async fn resolve(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[derive(Deserialize)]
struct AddressBody {
    #[serde(alias = "ip")]
    ip_addr: String,
}

/// Asks several public echo services and takes the first answer.
#[derive(Debug, Clone)]
pub struct HttpOutgoingAddress {
    client: reqwest::Client,
    endpoints: Vec<String>,
}

impl Default for HttpOutgoingAddress {
    fn default() -> Self {
        Self::with_endpoints(vec![
            "https://ifconfig.io/all.json".to_string(),
            "https://api.ipify.org?format=json".to_string(),
        ])
    }
}

impl HttpOutgoingAddress {
    /// Resolver querying the given JSON endpoints.
    pub fn with_endpoints(endpoints: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoints,
        }
    }

    async fn query(&self, url: &str) -> Result<String> {
        let body: AddressBody = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.ip_addr)
    }
}

#[async_trait]
impl OutgoingAddress for HttpOutgoingAddress {
    async fn resolve(&self) -> Result<String> {
        if self.endpoints.is_empty() {
            return Err(Error::NotFound("outgoing address endpoint".to_string()));
        }
        let queries = self
            .endpoints
            .iter()
            .map(|url| Box::pin(self.query(url)));
        let (address, _) = select_ok(queries).await?;
        debug!(address = %address, "Resolved outgoing address");
        Ok(address)
    }
}
