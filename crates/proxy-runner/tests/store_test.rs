// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL identity store tests.
//!
//! Require TEST_PROXY_RUNNER_DATABASE_URL or PROXY_RUNNER_DATABASE_URL.

use chrono::Utc;
use proxy_runner::error::Error;
use proxy_runner::migrations;
use proxy_runner::model::Identity;
use proxy_runner::store::{IdentityStore, PgIdentityStore};
use sqlx::PgPool;
use uuid::Uuid;

macro_rules! skip_if_no_db {
    () => {
        if std::env::var("TEST_PROXY_RUNNER_DATABASE_URL").is_err()
            && std::env::var("PROXY_RUNNER_DATABASE_URL").is_err()
        {
            eprintln!(
                "Skipping test: TEST_PROXY_RUNNER_DATABASE_URL or PROXY_RUNNER_DATABASE_URL not set"
            );
            return;
        }
    };
}

async fn get_test_pool() -> Option<PgPool> {
    let database_url = std::env::var("TEST_PROXY_RUNNER_DATABASE_URL")
        .or_else(|_| std::env::var("PROXY_RUNNER_DATABASE_URL"))
        .ok()?;
    let pool = PgPool::connect(&database_url).await.ok()?;
    migrations::run(&pool).await.ok()?;
    Some(pool)
}

/// Identity row with a unique identity string.
fn create_test_identity() -> Identity {
    let identity = format!("0x{}", Uuid::new_v4().simple());
    Identity {
        id: Uuid::new_v4(),
        path: format!("/var/lib/proxy-runner/identities/{}", identity),
        filename: format!("{}.json", identity),
        identity,
        passphrase: "secret".to_string(),
        is_use: false,
        insert_date: Utc::now(),
    }
}

#[tokio::test]
async fn test_add_get_remove() {
    skip_if_no_db!();
    let Some(pool) = get_test_pool().await else {
        eprintln!("Skipping test: could not connect to database");
        return;
    };

    let store = PgIdentityStore::new(pool);
    let identity = create_test_identity();

    let added = store.add(&identity).await.expect("Failed to add");
    assert_eq!(added.id, identity.id);
    assert_eq!(added.identity, identity.identity);

    let fetched = store
        .get(identity.id)
        .await
        .expect("Failed to get")
        .expect("Identity not found");
    assert_eq!(fetched.passphrase, "secret");
    assert_eq!(fetched.filename, identity.filename);

    let listed = store
        .list(Some(&identity.identity))
        .await
        .expect("Failed to list");
    assert_eq!(listed.len(), 1);

    store.remove(identity.id).await.expect("Failed to remove");
    assert!(store.get(identity.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_identity_rejected() {
    skip_if_no_db!();
    let Some(pool) = get_test_pool().await else {
        eprintln!("Skipping test: could not connect to database");
        return;
    };

    let store = PgIdentityStore::new(pool);
    let identity = create_test_identity();
    store.add(&identity).await.expect("Failed to add");

    let duplicate = Identity {
        id: Uuid::new_v4(),
        ..identity.clone()
    };
    let result = store.add(&duplicate).await;
    assert!(matches!(result, Err(Error::AlreadyExists(_))));

    store.remove(identity.id).await.expect("Failed to remove");
}

#[tokio::test]
async fn test_remove_missing_is_noop() {
    skip_if_no_db!();
    let Some(pool) = get_test_pool().await else {
        eprintln!("Skipping test: could not connect to database");
        return;
    };

    let store = PgIdentityStore::new(pool);
    store
        .remove(Uuid::new_v4())
        .await
        .expect("Removing a missing row should succeed");
}
