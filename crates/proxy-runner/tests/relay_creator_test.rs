// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Relay runner creator tests against the mock runtime.

mod common;

use std::sync::Arc;

use proxy_runner::Error;
use proxy_runner::config::RelayRunnerConfig;
use proxy_runner::creator::RelayRunnerCreator;
use proxy_runner::label::{Reference, ReferenceKind};
use proxy_runner::model::{RunnerRequest, RunnerService};
use proxy_runner::runner::RunnerCreator;
use proxy_runner::runtime::RuntimeError;
use proxy_runner::runtime::mock::MockRuntime;

use common::codec;

fn chain() -> Vec<Reference> {
    vec![
        Reference::Identity {
            id: Some("i1".into()),
            identity: Some("0xabc".into()),
            passphrase: Some("secret".into()),
        },
        Reference::VpnProvider {
            id: Some("p1".into()),
            user_identity: Some("0xabc".into()),
            provider_identity: Some("0xdef".into()),
        },
        Reference::upstream("u1"),
    ]
}

async fn runtime_with_identity() -> MockRuntime {
    let runtime = common::runtime();
    common::seed_runner(
        &runtime,
        "myst-0xabc",
        RunnerService::Identity,
        "running",
        &chain()[..1],
        Some("10.20.0.9"),
    )
    .await;
    runtime
}

fn creator(runtime: &MockRuntime, start_port: u16) -> RelayRunnerCreator {
    RelayRunnerCreator::new(
        Arc::new(runtime.clone()),
        codec(),
        RelayRunnerConfig {
            start_port,
            ..RelayRunnerConfig::default()
        },
        common::fast_retry(),
    )
}

async fn socat_containers(runtime: &MockRuntime) -> usize {
    runtime
        .containers()
        .await
        .iter()
        .filter(|c| c.labels.get("com.proxy-runner.project").map(String::as_str) == Some("socat"))
        .count()
}

// ============================================================================
// Explicit port
// ============================================================================

#[tokio::test]
async fn test_explicit_port_conflict_is_terminal() {
    let runtime = runtime_with_identity().await;
    runtime
        .fail_next_start(RuntimeError::new(
            500,
            "driver failed programming external connectivity: Bind for 0.0.0.0:8080 failed: port is already allocated",
        ))
        .await;

    let request = RunnerRequest::new("socat-u1", RunnerService::Relay, &chain()).with_port(8080);
    match creator(&runtime, 3128).create(&request).await {
        Err(Error::PortInUse(port)) => assert_eq!(port, 8080),
        other => panic!("expected PortInUse, got {:?}", other),
    }

    assert_eq!(runtime.create_count().await, 1);
    assert_eq!(socat_containers(&runtime).await, 0);
}

#[tokio::test]
async fn test_passphrase_never_labelled() {
    let runtime = runtime_with_identity().await;
    let request = RunnerRequest::new("socat-u1", RunnerService::Relay, &chain()).with_port(8080);
    let runner = creator(&runtime, 3128).create(&request).await.unwrap();

    let spec = runtime.spec_of(&runner.serial).await.unwrap();
    assert!(!spec.labels.keys().any(|k| k.contains("passphrase")));
    assert_eq!(
        spec.labels
            .get("com.proxy-runner.vpn-provider.provider-identity")
            .map(String::as_str),
        Some("0xdef")
    );
    assert_eq!(runner.reference_id(ReferenceKind::ProxyUpstream), Some("u1"));
}

// ============================================================================
// Automatic port
// ============================================================================

#[tokio::test]
async fn test_auto_port_skips_published_ports() {
    let runtime = runtime_with_identity().await;
    for (name, port) in [("socat-a", "8080"), ("socat-b", "8081")] {
        let mut labels = common::runner_labels(RunnerService::Relay, name, &[]);
        labels.insert("com.proxy-runner.publish-port".to_string(), port.to_string());
        runtime
            .insert_container(name, "running", labels, Default::default())
            .await;
    }

    let request = RunnerRequest::new("socat-u1", RunnerService::Relay, &chain());
    let runner = creator(&runtime, 8080).create(&request).await.unwrap();

    assert_eq!(runner.socket.port, Some(8082));
    let spec = runtime.spec_of(&runner.serial).await.unwrap();
    assert_eq!(
        spec.labels.get("com.proxy-runner.publish-port").map(String::as_str),
        Some("8082")
    );
    assert_eq!(spec.port_bindings, vec![(1234, 8082)]);
}

#[tokio::test]
async fn test_auto_port_non_port_failure_is_fatal() {
    let runtime = runtime_with_identity().await;
    runtime
        .fail_next_create(RuntimeError::new(500, "image not found"))
        .await;

    let request = RunnerRequest::new("socat-u1", RunnerService::Relay, &chain());
    let result = creator(&runtime, 8080).create(&request).await;

    assert!(matches!(result, Err(Error::Runtime(_))));
    assert_eq!(runtime.create_count().await, 1);
}

// ============================================================================
// Dependencies
// ============================================================================

#[tokio::test]
async fn test_stopped_identity_is_not_running() {
    let runtime = common::runtime();
    common::seed_runner(
        &runtime,
        "myst-0xabc",
        RunnerService::Identity,
        "exited",
        &chain()[..1],
        Some("10.20.0.9"),
    )
    .await;

    let request = RunnerRequest::new("socat-u1", RunnerService::Relay, &chain());
    let result = creator(&runtime, 8080).create(&request).await;
    assert!(matches!(result, Err(Error::NotRunning(_))));
}

#[tokio::test]
async fn test_missing_provider_reference() {
    let runtime = runtime_with_identity().await;
    let refs = vec![chain()[0].clone(), chain()[2].clone()];
    let request = RunnerRequest::new("socat-u1", RunnerService::Relay, &refs);
    let result = creator(&runtime, 8080).create(&request).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}
