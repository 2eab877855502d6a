// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Identity row storage.

mod memory;
mod postgres;

pub use memory::MemoryIdentityStore;
pub use postgres::PgIdentityStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::model::Identity;

/// Relational store of identity rows.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Rows, optionally restricted to one identity string.
    async fn list(&self, identity: Option<&str>) -> Result<Vec<Identity>>;

    /// Row by id.
    async fn get(&self, id: Uuid) -> Result<Option<Identity>>;

    /// Insert a row. A duplicate identity fails with `AlreadyExists`.
    async fn add(&self, identity: &Identity) -> Result<Identity>;

    /// Delete a row; missing rows are ignored.
    async fn remove(&self, id: Uuid) -> Result<()>;
}
