// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL identity store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::IdentityStore;
use crate::error::{Error, Result};
use crate::model::Identity;

/// Row of the `account_identity` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct IdentityRow {
    id: Uuid,
    identity: String,
    passphrase: String,
    path: String,
    filename: String,
    insert_date: DateTime<Utc>,
}

impl From<IdentityRow> for Identity {
    fn from(row: IdentityRow) -> Self {
        Identity {
            id: row.id,
            identity: row.identity,
            passphrase: row.passphrase,
            path: row.path,
            filename: row.filename,
            is_use: false,
            insert_date: row.insert_date,
        }
    }
}

/// Identity store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    /// Create a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn list(&self, identity: Option<&str>) -> Result<Vec<Identity>> {
        let rows: Vec<IdentityRow> = sqlx::query_as(
            r#"
            SELECT id, identity, passphrase, path, filename, insert_date
            FROM account_identity
            WHERE ($1::text IS NULL OR identity = $1)
            ORDER BY insert_date ASC
            "#,
        )
        .bind(identity)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Identity::from).collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Identity>> {
        let row: Option<IdentityRow> = sqlx::query_as(
            r#"
            SELECT id, identity, passphrase, path, filename, insert_date
            FROM account_identity
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Identity::from))
    }

    async fn add(&self, identity: &Identity) -> Result<Identity> {
        let row: IdentityRow = sqlx::query_as(
            r#"
            INSERT INTO account_identity (id, identity, passphrase, path, filename, insert_date, update_date)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING id, identity, passphrase, path, filename, insert_date
            "#,
        )
        .bind(identity.id)
        .bind(&identity.identity)
        .bind(&identity.passphrase)
        .bind(&identity.path)
        .bind(&identity.filename)
        .bind(identity.insert_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e
                && db.is_unique_violation()
            {
                return Error::AlreadyExists(format!("identity {}", identity.identity));
            }
            Error::Database(e)
        })?;

        Ok(row.into())
    }

    async fn remove(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM account_identity WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
