// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Identity key files on the local filesystem.
//!
//! Managed key files live at `<base>/<identity>/<identity>.json`. The
//! directory is bind-mounted into the identity container as its keystore.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Key file the node keeps next to the keystore; never an identity.
const REMEMBER_FILE: &str = "remember.json";

/// Key file storage.
#[async_trait]
pub trait KeyFileStore: Send + Sync {
    /// Every key file under the base directory, recursively.
    async fn list(&self) -> Result<Vec<PathBuf>>;

    /// The key file inside `dir`, if any.
    async fn find_in_dir(&self, dir: &Path) -> Result<Option<PathBuf>>;

    /// Identity string (`0x`-prefixed address) stored in a key file.
    async fn read_identity(&self, file: &Path) -> Result<String>;

    /// Move a key file to `<base>/<identity>/<identity>.json`.
    async fn move_and_rename(&self, file: &Path, identity: &str) -> Result<PathBuf>;

    /// Delete a key file; a missing file is not an error.
    async fn remove(&self, file: &Path) -> Result<()>;
}

fn is_key_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
        && path.file_name().is_none_or(|name| name != REMEMBER_FILE)
}

#[derive(Deserialize)]
struct KeyFile {
    address: Option<String>,
}

/// Key files under a base directory.
#[derive(Debug, Clone)]
pub struct FsKeyFileStore {
    base: PathBuf,
}

impl FsKeyFileStore {
    /// Store rooted at `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Base directory.
    pub fn base(&self) -> &Path {
        &self.base
    }
}

#[async_trait]
impl KeyFileStore for FsKeyFileStore {
    async fn list(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut pending = vec![self.base.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound && dir == self.base => return Ok(files),
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if is_key_file(&path) {
                    files.push(path);
                }
            }
        }

        files.sort();
        Ok(files)
    }

    async fn find_in_dir(&self, dir: &Path) -> Result<Option<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && is_key_file(&path) {
                found.push(path);
            }
        }
        found.sort();
        Ok(found.into_iter().next())
    }

    async fn read_identity(&self, file: &Path) -> Result<String> {
        let content = tokio::fs::read(file).await?;
        let key: KeyFile = serde_json::from_slice(&content)?;
        let address = key
            .address
            .filter(|a| !a.is_empty())
            .ok_or_else(|| Error::MissingField("address".to_string()))?;
        Ok(format!("0x{}", address.trim_start_matches("0x")))
    }

    async fn move_and_rename(&self, file: &Path, identity: &str) -> Result<PathBuf> {
        let dir = self.base.join(identity);
        tokio::fs::create_dir_all(&dir).await?;
        let dest = dir.join(format!("{}.json", identity));
        if dest == file {
            return Ok(dest);
        }

        if let Err(e) = tokio::fs::rename(file, &dest).await {
            // Cross-device moves cannot be renamed.
            debug!(from = %file.display(), to = %dest.display(), error = %e, "Rename failed, copying key file");
            tokio::fs::copy(file, &dest).await?;
            tokio::fs::remove_file(file).await?;
        }
        Ok(dest)
    }

    async fn remove(&self, file: &Path) -> Result<()> {
        match tokio::fs::remove_file(file).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
