// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Structured references carried in container labels.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind of domain object a [`Reference`] points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReferenceKind {
    /// VPN client identity.
    Identity,
    /// External exit-node offering.
    VpnProvider,
    /// Public relay end of a proxy chain.
    ProxyUpstream,
    /// Exit end of a proxy chain.
    ProxyDownstream,
}

impl ReferenceKind {
    /// Every kind, in label structuring order.
    pub const ALL: [ReferenceKind; 4] = [
        ReferenceKind::Identity,
        ReferenceKind::VpnProvider,
        ReferenceKind::ProxyUpstream,
        ReferenceKind::ProxyDownstream,
    ];

    /// `$namespace` tag of the raw form.
    pub fn namespace(&self) -> &'static str {
        match self {
            ReferenceKind::Identity => "Identity",
            ReferenceKind::VpnProvider => "VpnProvider",
            ReferenceKind::ProxyUpstream => "ProxyUpstream",
            ReferenceKind::ProxyDownstream => "ProxyDownstream",
        }
    }

    /// Kebab-case segment used in label keys.
    pub fn label_segment(&self) -> &'static str {
        match self {
            ReferenceKind::Identity => "identity",
            ReferenceKind::VpnProvider => "vpn-provider",
            ReferenceKind::ProxyUpstream => "proxy-upstream",
            ReferenceKind::ProxyDownstream => "proxy-downstream",
        }
    }

    /// Field names (camelCase) a reference of this kind can carry.
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            ReferenceKind::Identity => &["id", "identity", "passphrase"],
            ReferenceKind::VpnProvider => &["id", "userIdentity", "providerIdentity"],
            ReferenceKind::ProxyUpstream | ReferenceKind::ProxyDownstream => &["id"],
        }
    }

    /// Look a kind up by its `$namespace` tag.
    pub fn from_namespace(namespace: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.namespace() == namespace)
    }

    /// Look a kind up by its label key segment.
    pub fn from_label_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.label_segment() == segment)
    }
}

/// Foreign key to a domain object, as stored on a runner.
///
/// Every field is optional: writers omit what a given runner does not need
/// (the passphrase is never written to a container label).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "$namespace", rename_all_fields = "camelCase")]
pub enum Reference {
    /// Identity reference.
    Identity {
        /// Identity row id.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Public key string.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        identity: Option<String>,
        /// Keystore passphrase.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        passphrase: Option<String>,
    },
    /// Provider reference.
    VpnProvider {
        /// Provider id.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Identity the session is bound to.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_identity: Option<String>,
        /// Identity of the exit node.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_identity: Option<String>,
    },
    /// Upstream reference.
    ProxyUpstream {
        /// Upstream id.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    /// Downstream reference.
    ProxyDownstream {
        /// Downstream id.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
}

impl Reference {
    /// Identity reference with only an id.
    pub fn identity_id(id: impl Into<String>) -> Self {
        Reference::Identity {
            id: Some(id.into()),
            identity: None,
            passphrase: None,
        }
    }

    /// Identity reference with only the public key string.
    pub fn identity_key(identity: impl Into<String>) -> Self {
        Reference::Identity {
            id: None,
            identity: Some(identity.into()),
            passphrase: None,
        }
    }

    /// Provider reference with only an id.
    pub fn provider_id(id: impl Into<String>) -> Self {
        Reference::VpnProvider {
            id: Some(id.into()),
            user_identity: None,
            provider_identity: None,
        }
    }

    /// Provider reference with only the bound identity.
    pub fn provider_user(user_identity: impl Into<String>) -> Self {
        Reference::VpnProvider {
            id: None,
            user_identity: Some(user_identity.into()),
            provider_identity: None,
        }
    }

    /// Upstream reference.
    pub fn upstream(id: impl Into<String>) -> Self {
        Reference::ProxyUpstream {
            id: Some(id.into()),
        }
    }

    /// Downstream reference.
    pub fn downstream(id: impl Into<String>) -> Self {
        Reference::ProxyDownstream {
            id: Some(id.into()),
        }
    }

    /// Empty reference of the given kind.
    pub fn empty(kind: ReferenceKind) -> Self {
        match kind {
            ReferenceKind::Identity => Reference::Identity {
                id: None,
                identity: None,
                passphrase: None,
            },
            ReferenceKind::VpnProvider => Reference::VpnProvider {
                id: None,
                user_identity: None,
                provider_identity: None,
            },
            ReferenceKind::ProxyUpstream => Reference::ProxyUpstream { id: None },
            ReferenceKind::ProxyDownstream => Reference::ProxyDownstream { id: None },
        }
    }

    /// Kind of this reference.
    pub fn kind(&self) -> ReferenceKind {
        match self {
            Reference::Identity { .. } => ReferenceKind::Identity,
            Reference::VpnProvider { .. } => ReferenceKind::VpnProvider,
            Reference::ProxyUpstream { .. } => ReferenceKind::ProxyUpstream,
            Reference::ProxyDownstream { .. } => ReferenceKind::ProxyDownstream,
        }
    }

    /// The `id` field, whatever the kind.
    pub fn id(&self) -> Option<&str> {
        match self {
            Reference::Identity { id, .. }
            | Reference::VpnProvider { id, .. }
            | Reference::ProxyUpstream { id }
            | Reference::ProxyDownstream { id } => id.as_deref(),
        }
    }

    /// Value of a camelCase field.
    pub fn get(&self, field: &str) -> Option<&str> {
        let value = match (self, field) {
            (_, "id") => return self.id(),
            (Reference::Identity { identity, .. }, "identity") => identity,
            (Reference::Identity { passphrase, .. }, "passphrase") => passphrase,
            (Reference::VpnProvider { user_identity, .. }, "userIdentity") => user_identity,
            (
                Reference::VpnProvider {
                    provider_identity, ..
                },
                "providerIdentity",
            ) => provider_identity,
            _ => return None,
        };
        value.as_deref()
    }

    /// Set a camelCase field; unknown fields are ignored.
    pub fn set(&mut self, field: &str, value: String) {
        let slot = match (self, field) {
            (
                Reference::Identity { id, .. }
                | Reference::VpnProvider { id, .. }
                | Reference::ProxyUpstream { id }
                | Reference::ProxyDownstream { id },
                "id",
            ) => id,
            (Reference::Identity { identity, .. }, "identity") => identity,
            (Reference::Identity { passphrase, .. }, "passphrase") => passphrase,
            (Reference::VpnProvider { user_identity, .. }, "userIdentity") => user_identity,
            (
                Reference::VpnProvider {
                    provider_identity, ..
                },
                "providerIdentity",
            ) => provider_identity,
            _ => return,
        };
        *slot = Some(value);
    }

    /// Present fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.kind()
            .fields()
            .iter()
            .filter_map(move |field| self.get(field).map(|value| (*field, value)))
    }

    /// Raw JSON form with a `$namespace` tag.
    pub fn to_raw(&self) -> Value {
        let mut map = Map::new();
        map.insert(
            "$namespace".to_string(),
            Value::String(self.kind().namespace().to_string()),
        );
        for (field, value) in self.fields() {
            map.insert(field.to_string(), Value::String(value.to_string()));
        }
        Value::Object(map)
    }
}

/// Convert a camelCase field name to its kebab-case label form.
pub fn to_kebab(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    for c in field.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a kebab-case label segment back to camelCase.
pub fn from_kebab(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut upper = false;
    for c in segment.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
