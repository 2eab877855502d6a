// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Partially filled models decoded from references.

use std::collections::BTreeSet;
use std::ops::Deref;

use super::reference::{Reference, ReferenceKind};
use crate::error::{Error, Result};

/// A model built from a [`Reference`], plus the fields that could not be filled.
///
/// Fields listed as placeholders hold a default value and must not be used
/// before [`Filled::require`] has confirmed they are real.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filled<T> {
    value: T,
    placeholders: BTreeSet<&'static str>,
}

impl<T> Filled<T> {
    /// Wrap a value together with its placeholder field names.
    pub fn new(value: T, placeholders: BTreeSet<&'static str>) -> Self {
        Self {
            value,
            placeholders,
        }
    }

    /// Whether `field` still holds a placeholder.
    pub fn is_placeholder(&self, field: &str) -> bool {
        self.placeholders.contains(field)
    }

    /// Fail with [`Error::MissingField`] on the first listed placeholder.
    pub fn require(&self, fields: &[&str]) -> Result<&T> {
        match fields.iter().find(|f| self.is_placeholder(f)) {
            Some(field) => Err(Error::MissingField((*field).to_string())),
            None => Ok(&self.value),
        }
    }

    /// Placeholder field names.
    pub fn placeholders(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.placeholders.iter().copied()
    }

    /// Unwrap the model.
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> Deref for Filled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// A model that can be materialized from a reference of one kind.
pub trait Materialize: Sized {
    /// Reference kind the model is read from.
    const KIND: ReferenceKind;

    /// Build the model from a reference of [`Self::KIND`].
    fn materialize(reference: &Reference) -> Filled<Self>;
}

/// Identity fields carried by a reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityRef {
    /// Identity row id.
    pub id: String,
    /// Public key string.
    pub identity: String,
    /// Keystore passphrase.
    pub passphrase: String,
}

/// Provider fields carried by a reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VpnProviderRef {
    /// Provider id.
    pub id: String,
    /// Identity the session is bound to.
    pub user_identity: String,
    /// Identity of the exit node.
    pub provider_identity: String,
}

/// Upstream fields carried by a reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyUpstreamRef {
    /// Upstream id.
    pub id: String,
}

/// Downstream fields carried by a reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyDownstreamRef {
    /// Downstream id.
    pub id: String,
}

fn take(
    reference: &Reference,
    field: &'static str,
    placeholders: &mut BTreeSet<&'static str>,
) -> String {
    match reference.get(field) {
        Some(value) => value.to_string(),
        None => {
            placeholders.insert(field);
            String::new()
        }
    }
}

impl Materialize for IdentityRef {
    const KIND: ReferenceKind = ReferenceKind::Identity;

    fn materialize(reference: &Reference) -> Filled<Self> {
        let mut placeholders = BTreeSet::new();
        let value = IdentityRef {
            id: take(reference, "id", &mut placeholders),
            identity: take(reference, "identity", &mut placeholders),
            passphrase: take(reference, "passphrase", &mut placeholders),
        };
        Filled::new(value, placeholders)
    }
}

impl Materialize for VpnProviderRef {
    const KIND: ReferenceKind = ReferenceKind::VpnProvider;

    fn materialize(reference: &Reference) -> Filled<Self> {
        let mut placeholders = BTreeSet::new();
        let value = VpnProviderRef {
            id: take(reference, "id", &mut placeholders),
            user_identity: take(reference, "userIdentity", &mut placeholders),
            provider_identity: take(reference, "providerIdentity", &mut placeholders),
        };
        Filled::new(value, placeholders)
    }
}

impl Materialize for ProxyUpstreamRef {
    const KIND: ReferenceKind = ReferenceKind::ProxyUpstream;

    fn materialize(reference: &Reference) -> Filled<Self> {
        let mut placeholders = BTreeSet::new();
        let id = take(reference, "id", &mut placeholders);
        Filled::new(ProxyUpstreamRef { id }, placeholders)
    }
}

impl Materialize for ProxyDownstreamRef {
    const KIND: ReferenceKind = ReferenceKind::ProxyDownstream;

    fn materialize(reference: &Reference) -> Filled<Self> {
        let mut placeholders = BTreeSet::new();
        let id = take(reference, "id", &mut placeholders);
        Filled::new(ProxyDownstreamRef { id }, placeholders)
    }
}
