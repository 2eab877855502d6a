// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Flat label encoding of references.

use std::collections::BTreeMap;

use serde_json::Value;

use super::filled::{Filled, Materialize};
use super::reference::{Reference, ReferenceKind, from_kebab, to_kebab};
use crate::error::{Error, Result};

/// Value of `<prefix>.project`.
pub const PROJECT: &str = "project";
/// Runner id key.
pub const ID: &str = "id";
/// Creator key.
pub const CREATE_BY: &str = "create-by";
/// Relay host port key.
pub const PUBLISH_PORT: &str = "publish-port";

/// Decode raw references; each one must carry a known `$namespace` tag.
pub fn decode(raw: &[Value]) -> Result<Vec<Reference>> {
    raw.iter()
        .map(|value| {
            let tagged = value
                .get("$namespace")
                .and_then(Value::as_str)
                .and_then(ReferenceKind::from_namespace)
                .is_some();
            if !tagged {
                return Err(Error::MissingField("$namespace".to_string()));
            }
            Ok(serde_json::from_value(value.clone())?)
        })
        .collect()
}

/// Encode references into their raw form.
pub fn encode(references: &[Reference]) -> Vec<Value> {
    references.iter().map(Reference::to_raw).collect()
}

/// Build the model of `T::KIND` from the first reference of that kind.
pub fn materialize<T: Materialize>(references: &[Reference]) -> Result<Filled<T>> {
    references
        .iter()
        .find(|r| r.kind() == T::KIND)
        .map(T::materialize)
        .ok_or_else(|| Error::NotFound(T::KIND.namespace().to_string()))
}

/// First reference of a kind.
pub fn find(references: &[Reference], kind: ReferenceKind) -> Option<&Reference> {
    references.iter().find(|r| r.kind() == kind)
}

/// Converts between references and `<prefix>.<kind>.<field>` labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelCodec {
    prefix: String,
}

impl LabelCodec {
    /// Create a codec; a trailing `.` on the namespace is ignored.
    pub fn new(namespace: &str) -> Self {
        Self {
            prefix: namespace.trim_end_matches('.').to_string(),
        }
    }

    /// Label prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Codec writing under `<prefix>.<segment>`.
    pub fn scoped(&self, segment: &str) -> Self {
        Self {
            prefix: format!("{}.{}", self.prefix, segment),
        }
    }

    /// Full key of a reserved label (`project`, `id`, ...).
    pub fn key(&self, name: &str) -> String {
        format!("{}.{}", self.prefix, name)
    }

    /// Flatten every present field not listed in `exclude`.
    pub fn flatten(&self, references: &[Reference], exclude: &[&str]) -> BTreeMap<String, String> {
        references
            .iter()
            .flat_map(|reference| {
                reference
                    .fields()
                    .filter(move |(field, _)| !exclude.contains(field))
                    .map(move |(field, value)| (self.field_key(reference.kind(), field), value.to_string()))
            })
            .collect()
    }

    /// Flatten only the listed fields of one reference.
    pub fn flatten_selected(&self, reference: &Reference, include: &[&str]) -> BTreeMap<String, String> {
        reference
            .fields()
            .filter(|(field, _)| include.contains(field))
            .map(|(field, value)| (self.field_key(reference.kind(), field), value.to_string()))
            .collect()
    }

    /// Rebuild references from a label map.
    ///
    /// Keys outside `<prefix>.<known-kind>.<field>` are ignored. The result is
    /// ordered Identity, VpnProvider, ProxyUpstream, ProxyDownstream.
    pub fn structure(&self, labels: &BTreeMap<String, String>) -> Vec<Reference> {
        let lead = format!("{}.", self.prefix);
        let mut found: BTreeMap<ReferenceKind, Reference> = BTreeMap::new();

        for (key, value) in labels {
            let Some(rest) = key.strip_prefix(&lead) else {
                continue;
            };
            let Some((segment, field)) = rest.split_once('.') else {
                continue;
            };
            if field.contains('.') {
                continue;
            }
            let Some(kind) = ReferenceKind::from_label_segment(segment) else {
                continue;
            };
            let field = from_kebab(field);
            if !kind.fields().iter().any(|f| *f == field) {
                continue;
            }
            found
                .entry(kind)
                .or_insert_with(|| Reference::empty(kind))
                .set(&field, value.clone());
        }

        found.into_values().collect()
    }

    fn field_key(&self, kind: ReferenceKind, field: &str) -> String {
        format!("{}.{}.{}", self.prefix, kind.label_segment(), to_kebab(field))
    }
}
