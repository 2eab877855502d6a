// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Domain models.

pub mod filter;
pub mod identity;
pub mod provider;
pub mod proxy;
pub mod runner;

pub use filter::{
    IdentityFilter, Pagination, ProviderFilter, ProxyFilter, RunnerFilter, SortDirection,
};
pub use identity::{Identity, NewIdentity};
pub use provider::{ProviderIpType, VpnProvider};
pub use proxy::{ProxyDownstream, ProxyStatus, ProxyType, ProxyUpstream};
pub use runner::{
    Runner, RunnerExec, RunnerRequest, RunnerService, RunnerSocket, RunnerStatus, RunnerVolume,
    SocketType, VolumeRole,
};
