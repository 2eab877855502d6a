// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runner module - managed containers as domain runners.

mod container;
mod traits;

pub use container::ContainerRunnerRepository;
pub use traits::*;
