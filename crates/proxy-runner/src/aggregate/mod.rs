// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Read models assembled from runners, rows, files and providers.
//!
//! Aggregators never keep state of their own. Every call re-reads its
//! collaborators (concurrently where the reads are independent) and joins
//! the results in memory.

pub mod filter;
mod identity;
mod proxy;

pub use identity::IdentityAggregate;
pub use proxy::ProxyAggregate;
