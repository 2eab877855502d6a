// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! VPN provider model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of address an exit node sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderIpType {
    /// Data-center address.
    Hosting,
    /// Residential address.
    Residential,
    /// Business line.
    Business,
    /// Mobile carrier.
    Mobile,
}

impl ProviderIpType {
    /// Parse the provider API's `ip_type` value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "hosting" => Some(ProviderIpType::Hosting),
            "residential" => Some(ProviderIpType::Residential),
            "business" => Some(ProviderIpType::Business),
            "mobile" => Some(ProviderIpType::Mobile),
            _ => None,
        }
    }
}

/// External exit-node offering, read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpnProvider {
    /// Stable id derived from `provider_identity`.
    pub id: String,
    /// Identity a session is bound to, when registered.
    pub user_identity: Option<String>,
    /// Identity of the exit node.
    pub provider_identity: String,
    /// Tunnel type (`wireguard`).
    pub service_type: String,
    /// Address kind.
    pub ip_type: Option<ProviderIpType>,
    /// ISO country code.
    pub country: Option<String>,
    /// Exit address.
    pub ip: Option<String>,
    /// Exit address prefix length.
    pub mask: Option<u8>,
    /// Quality score.
    pub quality: Option<f64>,
    /// Bandwidth figure.
    pub bandwidth: Option<f64>,
    /// Latency figure.
    pub latency: Option<f64>,
    /// A session runner is bound to this provider.
    pub is_register: bool,
    /// Fetch time.
    pub insert_date: DateTime<Utc>,
}
