// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Key file store tests on a temporary directory.

mod common;

use proxy_runner::error::Error;
use proxy_runner::keyfile::{FsKeyFileStore, KeyFileStore};
use tempfile::TempDir;

#[tokio::test]
async fn test_list_recurses_and_skips_remember() {
    let dir = TempDir::new().unwrap();
    let base = dir.path();
    common::write_key_file(&base.join("0xaa").join("0xaa.json"), "aa");
    common::write_key_file(&base.join("0xbb").join("0xbb.json"), "bb");
    common::write_key_file(&base.join("remember.json"), "cc");
    std::fs::write(base.join("0xaa").join("notes.txt"), "x").unwrap();

    let files = FsKeyFileStore::new(base).list().await.unwrap();
    assert_eq!(
        files,
        vec![
            base.join("0xaa").join("0xaa.json"),
            base.join("0xbb").join("0xbb.json"),
        ]
    );
}

#[tokio::test]
async fn test_missing_base_lists_nothing() {
    let dir = TempDir::new().unwrap();
    let store = FsKeyFileStore::new(dir.path().join("absent"));
    assert!(store.list().await.unwrap().is_empty());
    assert!(
        store
            .find_in_dir(&dir.path().join("absent"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_read_identity_normalizes_prefix() {
    let dir = TempDir::new().unwrap();
    let store = FsKeyFileStore::new(dir.path());
    let bare = dir.path().join("bare.json");
    let prefixed = dir.path().join("prefixed.json");
    common::write_key_file(&bare, "abc");
    common::write_key_file(&prefixed, "0xabc");

    assert_eq!(store.read_identity(&bare).await.unwrap(), "0xabc");
    assert_eq!(store.read_identity(&prefixed).await.unwrap(), "0xabc");
}

#[tokio::test]
async fn test_read_identity_without_address() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("key.json");
    std::fs::write(&file, r#"{"version":3}"#).unwrap();

    let result = FsKeyFileStore::new(dir.path()).read_identity(&file).await;
    assert!(matches!(result, Err(Error::MissingField(field)) if field == "address"));
}

#[tokio::test]
async fn test_move_and_rename_then_remove() {
    let base = TempDir::new().unwrap();
    let inbox = TempDir::new().unwrap();
    let upload = inbox.path().join("UTC--2025.json");
    common::write_key_file(&upload, "abc");
    let store = FsKeyFileStore::new(base.path());

    let dest = store.move_and_rename(&upload, "0xabc").await.unwrap();
    assert_eq!(dest, base.path().join("0xabc").join("0xabc.json"));
    assert!(dest.exists());
    assert!(!upload.exists());
    assert_eq!(
        store.find_in_dir(&base.path().join("0xabc")).await.unwrap(),
        Some(dest.clone())
    );

    store.remove(&dest).await.unwrap();
    assert!(!dest.exists());
    store.remove(&dest).await.unwrap();
}
