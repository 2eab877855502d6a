// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory identity store for tests and dry runs.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::IdentityStore;
use crate::error::{Error, Result};
use crate::model::Identity;

/// Identity store kept in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryIdentityStore {
    rows: Arc<Mutex<Vec<Identity>>>,
}

impl MemoryIdentityStore {
    /// Store seeded with rows.
    pub fn with_rows(rows: Vec<Identity>) -> Self {
        Self {
            rows: Arc::new(Mutex::new(rows)),
        }
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn list(&self, identity: Option<&str>) -> Result<Vec<Identity>> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .filter(|row| identity.is_none_or(|i| row.identity == i))
            .cloned()
            .collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Identity>> {
        Ok(self.rows.lock().await.iter().find(|row| row.id == id).cloned())
    }

    async fn add(&self, identity: &Identity) -> Result<Identity> {
        let mut rows = self.rows.lock().await;
        if rows.iter().any(|row| row.identity == identity.identity) {
            return Err(Error::AlreadyExists(format!("identity {}", identity.identity)));
        }
        rows.push(identity.clone());
        Ok(identity.clone())
    }

    async fn remove(&self, id: Uuid) -> Result<()> {
        self.rows.lock().await.retain(|row| row.id != id);
        Ok(())
    }
}
