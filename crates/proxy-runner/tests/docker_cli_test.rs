// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Docker CLI adapter tests against a scripted client binary.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use proxy_runner::runtime::docker::DockerCli;
use proxy_runner::runtime::{ContainerFilter, ContainerRuntime};
use tempfile::TempDir;

const LIVE_CONTAINER: &str = r#"[{
    "Id": "aaa",
    "Name": "/myst-0xabc",
    "Created": "2025-01-01T10:00:00Z",
    "State": {"Status": "running", "ExitCode": 0, "Error": ""},
    "Config": {"Labels": {"com.proxy-runner.project": "myst"}},
    "NetworkSettings": {"Networks": {"proxy-runner": {"IPAddress": "10.20.0.2"}}}
}]"#;

/// Write an executable shell script standing in for the client binary.
fn fake_client(dir: &Path, inspect_stderr: &str) -> PathBuf {
    let path = dir.join("docker");
    let script = format!(
        "#!/bin/sh\ncase \"$1\" in\n  ps) printf 'aaa\\nbbb\\n' ;;\n  inspect)\n    cat <<'JSON'\n{}\nJSON\n    echo '{}' >&2\n    exit 1 ;;\nesac\n",
        LIVE_CONTAINER, inspect_stderr
    );
    std::fs::write(&path, script).expect("Failed to write fake client");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to mark fake client executable");
    path
}

#[tokio::test]
async fn test_list_skips_containers_removed_after_ps() {
    let dir = TempDir::new().unwrap();
    let client = fake_client(dir.path(), "Error: No such object: bbb");

    let containers = DockerCli::with_binary(client.display().to_string())
        .list_containers(&ContainerFilter::all())
        .await
        .expect("listing should tolerate a vanished container");

    assert_eq!(containers.len(), 1);
    assert_eq!(containers[0].id, "aaa");
    assert_eq!(containers[0].name, "myst-0xabc");
    assert_eq!(
        containers[0].networks.get("proxy-runner").map(String::as_str),
        Some("10.20.0.2")
    );
}

#[tokio::test]
async fn test_list_fails_on_other_inspect_errors() {
    let dir = TempDir::new().unwrap();
    let client = fake_client(dir.path(), "permission denied while trying to connect");

    let err = DockerCli::with_binary(client.display().to_string())
        .list_containers(&ContainerFilter::all())
        .await
        .unwrap_err();

    assert_eq!(err.code, 500);
}
