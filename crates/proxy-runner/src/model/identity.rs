// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Identity model.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// VPN client identity.
///
/// `identity`, `passphrase` and `id` come from the relational store, `path`
/// and `filename` locate the key file, and `is_use` is derived from the
/// session runners bound to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Row id.
    pub id: Uuid,
    /// Public key string (`0x...`).
    pub identity: String,
    /// Keystore passphrase.
    pub passphrase: String,
    /// Directory holding the key file.
    pub path: String,
    /// Key file name.
    pub filename: String,
    /// A session is currently bound to this identity.
    #[serde(default)]
    pub is_use: bool,
    /// Row creation time.
    pub insert_date: DateTime<Utc>,
}

impl Identity {
    /// Full path of the key file.
    pub fn key_file(&self) -> PathBuf {
        Path::new(&self.path).join(&self.filename)
    }
}

/// Input of the identity add path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIdentity {
    /// Uploaded key file.
    pub key_file: PathBuf,
    /// Keystore passphrase.
    pub passphrase: String,
}
