// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runner creators.
//!
//! Each creator provisions one container kind and talks only to the
//! container runtime. Conflicts on a shared resource (a static address,
//! a published port) are retried with a randomized backoff; every other
//! failure ends the call after the half-created container is removed.

pub mod allocate;
mod identity;
mod relay;

pub use identity::IdentityRunnerCreator;
pub use relay::RelayRunnerCreator;

use tracing::warn;

use crate::runtime::{ContainerRuntime, ContainerSpec, RuntimeError};

/// Label every managed container carries for the autoheal sidecar.
pub(crate) const AUTOHEAL: &str = "autoheal";

/// Host timezone, mounted read-only.
pub(crate) const LOCALTIME_BIND: &str = "/etc/localtime:/etc/localtime:ro";

/// A failed create-and-start, with the container id when creation got that far.
#[derive(Debug)]
pub(crate) struct LaunchFailure {
    pub container: Option<String>,
    pub error: RuntimeError,
}

/// Create and start a container.
pub(crate) async fn launch(
    runtime: &dyn ContainerRuntime,
    spec: &ContainerSpec,
) -> Result<String, LaunchFailure> {
    let id = runtime
        .create_container(spec)
        .await
        .map_err(|error| LaunchFailure {
            container: None,
            error,
        })?;
    match runtime.start_container(&id).await {
        Ok(()) => Ok(id),
        Err(error) => Err(LaunchFailure {
            container: Some(id),
            error,
        }),
    }
}

/// Remove a container, logging instead of failing.
pub(crate) async fn discard(runtime: &dyn ContainerRuntime, id: &str) {
    if let Err(e) = runtime.remove_container(id).await
        && !e.is_not_found()
    {
        warn!(container = %id, error = %e, "Failed to remove leftover container");
    }
}
