// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Query filters.

use serde::{Deserialize, Serialize};

use super::proxy::ProxyStatus;
use super::runner::RunnerService;
use crate::label::Reference;

/// Default page size.
pub const DEFAULT_LIMIT: usize = 100;

/// Page selection over an in-memory list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// 1-based page number.
    pub page: usize,
    /// Page size.
    pub limit: usize,
    /// Return everything.
    pub skip: bool,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
            skip: false,
        }
    }
}

impl Pagination {
    /// No paging.
    pub fn unbounded() -> Self {
        Self {
            skip: true,
            ..Self::default()
        }
    }

    /// Slice `items`; returns the page and the pre-slice count.
    pub fn apply<T>(&self, items: Vec<T>) -> (Vec<T>, usize) {
        let total = items.len();
        if self.skip {
            return (items, total);
        }
        let start = self.page.max(1).saturating_sub(1).saturating_mul(self.limit);
        let page = items.into_iter().skip(start).take(self.limit).collect();
        (page, total)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Oldest first.
    Asc,
    /// Newest first.
    Desc,
}

/// Runner selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunnerFilter {
    /// Hosted service.
    pub service: Option<RunnerService>,
    /// Exact container name.
    pub name: Option<String>,
    /// References every runner must carry (passphrases are ignored).
    pub references: Vec<Reference>,
}

impl RunnerFilter {
    /// Runners of one service.
    pub fn service(service: RunnerService) -> Self {
        Self {
            service: Some(service),
            ..Self::default()
        }
    }

    /// Runners carrying a reference.
    pub fn reference(reference: Reference) -> Self {
        Self {
            references: vec![reference],
            ..Self::default()
        }
    }

    /// Also require a reference.
    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.references.push(reference);
        self
    }
}

/// Identity list filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityFilter {
    /// Exact identity string.
    pub identity: Option<String>,
    /// Only identities (not) bound to a session.
    pub is_use: Option<bool>,
    /// Page selection.
    pub pagination: Pagination,
}

/// Provider list filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderFilter {
    /// Only providers with (or without) a bound session.
    pub is_register: Option<bool>,
    /// ISO country code.
    pub country: Option<String>,
}

impl ProviderFilter {
    /// Providers with a bound session.
    pub fn registered() -> Self {
        Self {
            is_register: Some(true),
            ..Self::default()
        }
    }
}

/// Proxy list filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyFilter {
    /// Published host port.
    pub listen_port: Option<u16>,
    /// Downstream status.
    pub status: Option<ProxyStatus>,
    /// Downstream provider id.
    pub ref_id: Option<String>,
    /// Order by insert date.
    pub sort_insert_date: Option<SortDirection>,
    /// Page selection.
    pub pagination: Pagination,
}
