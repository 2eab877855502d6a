// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runner trait definitions.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Runner, RunnerFilter, RunnerRequest, RunnerService};

/// Provisions runners of one service kind.
///
/// Creators only talk to the container runtime; they never read the
/// relational store or call each other.
#[async_trait]
pub trait RunnerCreator: Send + Sync {
    /// Service this creator provisions.
    fn service(&self) -> RunnerService;

    /// Provision a runner for the request.
    async fn create(&self, request: &RunnerRequest) -> Result<Runner>;
}

/// Read and write access to managed runners.
#[async_trait]
pub trait RunnerRepository: Send + Sync {
    /// Runners matching the filter.
    async fn list(&self, filter: &RunnerFilter) -> Result<Vec<Runner>>;

    /// Runner by internal id.
    async fn get(&self, id: &str) -> Result<Option<Runner>>;

    /// Provision a runner through the creator registered for its service.
    async fn create(&self, request: &RunnerRequest) -> Result<Runner>;

    /// Force-remove a runner and its anonymous volumes. Missing runners are ignored.
    async fn remove(&self, id: &str) -> Result<()>;
}
