// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for proxy-runner integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use proxy_runner::config::{Config, IdentityRunnerConfig, RelayRunnerConfig, RetryConfig};
use proxy_runner::label::{LabelCodec, Reference};
use proxy_runner::model::RunnerService;
use proxy_runner::runtime::mock::MockRuntime;

pub const NAMESPACE: &str = "com.proxy-runner";
pub const NETWORK: &str = "proxy-runner";

pub fn codec() -> LabelCodec {
    LabelCodec::new(NAMESPACE)
}

/// Mock runtime with a /24 managed network.
pub fn runtime() -> MockRuntime {
    MockRuntime::new(NETWORK, "10.20.0.0/24", "10.20.0.1")
}

/// Retry policy without backoff delays.
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        backoff_min: Duration::ZERO,
        backoff_max: Duration::ZERO,
    }
}

/// Configuration pointing the keystore at `keystore_dir`.
pub fn config(keystore_dir: &Path) -> Config {
    Config {
        database_url: String::new(),
        label_namespace: NAMESPACE.to_string(),
        identity: IdentityRunnerConfig {
            keystore_dir: keystore_dir.to_path_buf(),
            ready_attempts: 0,
            ..IdentityRunnerConfig::default()
        },
        relay: RelayRunnerConfig::default(),
        retry: fast_retry(),
        provider_api_url: "http://127.0.0.1:4050".to_string(),
        listen_addr: Some("203.0.113.10".to_string()),
    }
}

/// Labels a managed container of `service` carries.
pub fn runner_labels(
    service: RunnerService,
    runner_id: &str,
    references: &[Reference],
) -> BTreeMap<String, String> {
    let codec = codec();
    let mut labels = codec.flatten(references, &["passphrase"]);
    labels.insert(codec.key("project"), service.project().to_string());
    labels.insert(codec.key("id"), runner_id.to_string());
    labels
}

/// Seed a managed container; returns its runtime id.
pub async fn seed_runner(
    runtime: &MockRuntime,
    name: &str,
    service: RunnerService,
    state: &str,
    references: &[Reference],
    address: Option<&str>,
) -> String {
    let networks = address
        .map(|a| BTreeMap::from([(NETWORK.to_string(), a.to_string())]))
        .unwrap_or_default();
    runtime
        .insert_container(
            name,
            state,
            runner_labels(service, &format!("runner-{}", name), references),
            networks,
        )
        .await
}

/// Write a node key file holding `address`.
pub fn write_key_file(path: &Path, address: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create key dir");
    }
    let body = serde_json::json!({
        "address": address,
        "crypto": {"cipher": "aes-128-ctr"},
        "version": 3
    });
    std::fs::write(path, body.to_string()).expect("Failed to write key file");
}
