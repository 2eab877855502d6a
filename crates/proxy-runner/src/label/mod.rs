// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Label codec.
//!
//! Relationships between runners and domain objects are never stored in a
//! table. They are written as container labels of the form
//! `<prefix>.<kind>.<field>=<value>` and read back into [`Reference`]s.
//!
//! ```text
//! [{"$namespace": "Identity", "id": "..", "identity": "0xab.."}]
//!        │ decode                       ▲ encode
//!        ▼                              │
//!   Vec<Reference> ──── flatten ───► com.proxy-runner.identity.id=..
//!        ▲                             com.proxy-runner.identity.identity=0xab..
//!        └────────── structure ───────┘
//! ```

pub mod codec;
pub mod filled;
pub mod reference;

pub use codec::{LabelCodec, decode, encode, find, materialize};
pub use filled::{
    Filled, IdentityRef, Materialize, ProxyDownstreamRef, ProxyUpstreamRef, VpnProviderRef,
};
pub use reference::{Reference, ReferenceKind};
