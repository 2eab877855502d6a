// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Proxy chain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::runner::Runner;

/// Health of a downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyStatus {
    /// Identity and session both running.
    Online,
    /// Identity present, session missing or down.
    Offline,
    /// No identity runner.
    Disable,
}

/// Downstream technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyType {
    /// Mysterium exit.
    Myst,
}

/// Exit end of a proxy chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyDownstream {
    /// Downstream id, from the edge runner.
    pub id: Option<String>,
    /// Provider this downstream exits through.
    pub ref_id: Option<String>,
    /// Exit address.
    pub ip: Option<String>,
    /// Exit prefix length.
    pub mask: Option<u8>,
    /// Exit country.
    pub country: Option<String>,
    /// Technology.
    #[serde(rename = "type")]
    pub kind: ProxyType,
    /// Derived health.
    pub status: ProxyStatus,
    /// Edge runner, if any.
    pub runner: Option<Runner>,
}

/// Public end of a proxy chain, one per relay runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyUpstream {
    /// Upstream id.
    pub id: String,
    /// Host's public address.
    pub listen_addr: String,
    /// Published host port.
    pub listen_port: Option<u16>,
    /// Always exactly one entry.
    pub proxy_downstream: Vec<ProxyDownstream>,
    /// Relay runner.
    pub runner: Runner,
    /// Relay creation time.
    pub insert_date: DateTime<Utc>,
}
