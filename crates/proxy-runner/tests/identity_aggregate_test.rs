// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Identity aggregate tests: rows, key files and runners joined in memory.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use proxy_runner::error::{Error, Result};
use proxy_runner::label::Reference;
use proxy_runner::model::{Identity, IdentityFilter, NewIdentity, RunnerService};
use proxy_runner::outgoing::StaticOutgoingAddress;
use proxy_runner::provider::StaticProviderApi;
use proxy_runner::runtime::mock::MockRuntime;
use proxy_runner::store::{IdentityStore, MemoryIdentityStore};
use proxy_runner::ProxyRunner;
use tempfile::TempDir;
use uuid::Uuid;

struct Harness {
    runtime: MockRuntime,
    store: MemoryIdentityStore,
    app: ProxyRunner,
    keystore: TempDir,
}

fn harness(rows: Vec<Identity>) -> Harness {
    let keystore = TempDir::new().expect("Failed to create temp dir");
    let runtime = common::runtime();
    let store = MemoryIdentityStore::with_rows(rows);
    let app = ProxyRunner::new(
        &common::config(keystore.path()),
        Arc::new(runtime.clone()),
        Arc::new(store.clone()),
        Arc::new(StaticProviderApi::default()),
        Arc::new(StaticOutgoingAddress("203.0.113.10".into())),
    );
    Harness {
        runtime,
        store,
        app,
        keystore,
    }
}

fn row(identity: &str, dir: &std::path::Path) -> Identity {
    Identity {
        id: Uuid::new_v4(),
        identity: identity.into(),
        passphrase: "pw".into(),
        path: dir.join(identity).display().to_string(),
        filename: format!("{}.json", identity),
        is_use: false,
        insert_date: Utc::now(),
    }
}

async fn bind_session(runtime: &MockRuntime, identity: &str) {
    common::seed_runner(
        runtime,
        &format!("myst-connect-{}", identity),
        RunnerService::Session,
        "running",
        &[
            Reference::identity_key(identity),
            Reference::VpnProvider {
                id: Some("p1".into()),
                user_identity: Some(identity.into()),
                provider_identity: Some("0xdef".into()),
            },
        ],
        None,
    )
    .await;
}

/// Store where a concurrent writer inserts `existing` between the
/// pre-check and the insert.
struct RacingStore {
    existing: Identity,
    inserted: AtomicBool,
}

#[async_trait]
impl IdentityStore for RacingStore {
    async fn list(&self, identity: Option<&str>) -> Result<Vec<Identity>> {
        if !self.inserted.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        Ok(std::iter::once(self.existing.clone())
            .filter(|row| identity.is_none_or(|i| row.identity == i))
            .collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Identity>> {
        let visible = self.inserted.load(Ordering::SeqCst) && self.existing.id == id;
        Ok(visible.then(|| self.existing.clone()))
    }

    async fn add(&self, identity: &Identity) -> Result<Identity> {
        self.inserted.store(true, Ordering::SeqCst);
        Err(Error::AlreadyExists(format!("identity {}", identity.identity)))
    }

    async fn remove(&self, _id: Uuid) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// List
// ============================================================================

#[tokio::test]
async fn test_list_joins_rows_with_files() {
    let h = harness(Vec::new());
    let base = h.keystore.path().to_path_buf();
    common::write_key_file(&base.join("id-1").join("id-1.json"), "aa");
    common::write_key_file(&base.join("remember.json"), "bb");
    h.store.add(&row("id-1", &base)).await.unwrap();
    h.store.add(&row("id-2", &base)).await.unwrap();

    let (items, total) = h.app.identities().list(&IdentityFilter::default()).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(items[0].identity, "id-1");
    assert_eq!(items[0].filename, "id-1.json");
    assert!(!items[0].is_use);

    bind_session(&h.runtime, "id-1").await;
    let (items, _) = h.app.identities().list(&IdentityFilter::default()).await.unwrap();
    assert!(items[0].is_use);

    let unused = IdentityFilter {
        is_use: Some(false),
        ..IdentityFilter::default()
    };
    let (items, total) = h.app.identities().list(&unused).await.unwrap();
    assert!(items.is_empty());
    assert_eq!(total, 0);
}

#[tokio::test]
async fn test_list_empty_without_files() {
    let h = harness(Vec::new());
    let base = h.keystore.path().to_path_buf();
    h.store.add(&row("id-1", &base)).await.unwrap();

    let (items, total) = h.app.identities().list(&IdentityFilter::default()).await.unwrap();
    assert!(items.is_empty());
    assert_eq!(total, 0);
}

// ============================================================================
// Add / get / remove
// ============================================================================

#[tokio::test]
async fn test_add_moves_key_file_and_starts_runner() {
    let h = harness(Vec::new());
    let inbox = TempDir::new().unwrap();
    let upload = inbox.path().join("UTC--upload.json");
    common::write_key_file(&upload, "abc123");

    let identity = h
        .app
        .identities()
        .add(&NewIdentity {
            key_file: upload.clone(),
            passphrase: "secret".into(),
        })
        .await
        .unwrap();

    assert_eq!(identity.identity, "0xabc123");
    let managed = h.keystore.path().join("0xabc123").join("0xabc123.json");
    assert!(managed.exists());
    assert!(!upload.exists());

    let containers = h.runtime.containers().await;
    assert_eq!(containers.len(), 1);
    assert_eq!(containers[0].name, "myst-0xabc123");
    assert_eq!(containers[0].state, "running");

    let fetched = h.app.identities().get(identity.id).await.unwrap().unwrap();
    assert_eq!(fetched.identity, "0xabc123");
    assert!(!fetched.is_use);
}

#[tokio::test]
async fn test_add_existing_identity_rejected() {
    let h = harness(Vec::new());
    let inbox = TempDir::new().unwrap();
    let first = inbox.path().join("first.json");
    let second = inbox.path().join("second.json");
    common::write_key_file(&first, "abc123");
    common::write_key_file(&second, "0xabc123");

    h.app
        .identities()
        .add(&NewIdentity {
            key_file: first,
            passphrase: "secret".into(),
        })
        .await
        .unwrap();
    let result = h
        .app
        .identities()
        .add(&NewIdentity {
            key_file: second.clone(),
            passphrase: "secret".into(),
        })
        .await;

    assert!(matches!(result, Err(Error::AlreadyExists(_))));
    assert!(second.exists());
}

#[tokio::test]
async fn test_get_requires_running_runner() {
    let h = harness(Vec::new());
    let base = h.keystore.path().to_path_buf();
    common::write_key_file(&base.join("0xaa").join("0xaa.json"), "aa");
    let identity = row("0xaa", &base);
    h.store.add(&identity).await.unwrap();

    assert!(h.app.identities().get(identity.id).await.unwrap().is_none());

    common::seed_runner(
        &h.runtime,
        "myst-0xaa",
        RunnerService::Identity,
        "running",
        &[Reference::Identity {
            id: Some(identity.id.to_string()),
            identity: Some("0xaa".into()),
            passphrase: None,
        }],
        Some("10.20.0.5"),
    )
    .await;
    assert!(h.app.identities().get(identity.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_remove_refused_while_in_use() {
    let h = harness(Vec::new());
    let base = h.keystore.path().to_path_buf();
    let identity = row("0xaa", &base);
    h.store.add(&identity).await.unwrap();
    bind_session(&h.runtime, "0xaa").await;

    let result = h.app.identities().remove(identity.id).await;
    assert!(matches!(result, Err(Error::InUse(_))));
    assert!(h.store.get(identity.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_remove_deletes_runner_file_and_row() {
    let h = harness(Vec::new());
    let inbox = TempDir::new().unwrap();
    let upload = inbox.path().join("key.json");
    common::write_key_file(&upload, "abc123");
    let identity = h
        .app
        .identities()
        .add(&NewIdentity {
            key_file: upload,
            passphrase: "secret".into(),
        })
        .await
        .unwrap();

    h.app.identities().remove(identity.id).await.unwrap();

    assert!(h.runtime.containers().await.is_empty());
    assert!(!identity.key_file().exists());
    assert!(h.store.get(identity.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_add_reuses_row_inserted_concurrently() {
    let keystore = TempDir::new().unwrap();
    let runtime = common::runtime();
    let existing = row("0xabc123", keystore.path());
    let app = ProxyRunner::new(
        &common::config(keystore.path()),
        Arc::new(runtime.clone()),
        Arc::new(RacingStore {
            existing: existing.clone(),
            inserted: AtomicBool::new(false),
        }),
        Arc::new(StaticProviderApi::default()),
        Arc::new(StaticOutgoingAddress("203.0.113.10".into())),
    );
    let inbox = TempDir::new().unwrap();
    let upload = inbox.path().join("key.json");
    common::write_key_file(&upload, "abc123");

    let identity = app
        .identities()
        .add(&NewIdentity {
            key_file: upload,
            passphrase: "secret".into(),
        })
        .await
        .unwrap();

    assert_eq!(identity.id, existing.id);
    let containers = runtime.containers().await;
    assert_eq!(containers.len(), 1);
    assert_eq!(containers[0].name, "myst-0xabc123");
    assert_eq!(containers[0].state, "running");
    assert_eq!(
        containers[0]
            .labels
            .get("com.proxy-runner.identity.id")
            .map(String::as_str),
        Some(existing.id.to_string().as_str())
    );
}
