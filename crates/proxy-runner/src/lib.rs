// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Proxy Runner - VPN exit proxy provisioning
//!
//! This crate provisions and reconciles the containers behind a pool of
//! residential/hosting VPN exit proxies. Every proxy chain is a set of
//! labelled containers; the runtime's label store is the only place the
//! relationships between them are recorded.
//!
//! # Architecture
//!
//! ```text
//!                       public port (3128, 3129, ...)
//!                                   │
//!                                   ▼
//! ┌──────────────┐  forward  ┌──────────────┐  netns  ┌──────────────┐
//! │    RELAY     │──────────►│   IDENTITY   │◄────────│   SESSION    │
//! │   (socat)    │  :10001   │   (myst)     │         │(myst-connect)│
//! └──────────────┘           └──────┬───────┘         └──────────────┘
//!                                   │ keystore volume        │
//!                                   ▼                        ▼
//!                        <keystore>/<identity>/        VPN provider
//!                                                     (exit node)
//! ┌───────────────────────────────────────────────────────────────────┐
//! │ PostgreSQL: account_identity rows                                 │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Label Encoding
//!
//! Each container carries `<prefix>.project` (its service), `<prefix>.id`
//! (runner id), and one `<prefix>.<kind>.<field>` label per reference
//! field. Passphrases are never written to labels.
//!
//! | Service | `project` | Creator |
//! |---------|-----------|---------|
//! | IDENTITY | `myst` | [`creator::IdentityRunnerCreator`] |
//! | SESSION | `myst-connect` | - |
//! | RELAY | `socat` | [`creator::RelayRunnerCreator`] |
//! | EDGE | `envoy` | - |
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `PROXY_RUNNER_DATABASE_URL` | Yes* | - | PostgreSQL connection string |
//! | `DATABASE_URL` | Yes* | - | Fallback if above not set |
//! | `PROXY_RUNNER_LABEL_NAMESPACE` | No | `com.proxy-runner` | Label prefix |
//! | `PROXY_RUNNER_NETWORK` | No | `proxy-runner` | Managed container network |
//! | `PROXY_RUNNER_KEYSTORE_DIR` | No | `.data/identities` | Managed key files |
//! | `PROXY_RUNNER_PROVIDER_API_URL` | No | `http://127.0.0.1:4050` | Provider catalog |
//! | `PROXY_RUNNER_LISTEN_ADDR` | No | resolved | Public address of the relays |
//!
//! See [`config::Config::from_env`] for the full list.
//!
//! # Modules
//!
//! - [`label`]: Reference model and label codec
//! - [`runtime`]: Container runtime abstraction (Docker CLI, mock)
//! - [`creator`]: IDENTITY and RELAY runner creators
//! - [`runner`]: Runner repository over the container runtime
//! - [`aggregate`]: Identity and proxy read models
//! - [`store`], [`keyfile`], [`provider`], [`outgoing`]: external collaborators

#![deny(missing_docs)]

/// Database migrations for proxy-runner.
pub mod migrations;

/// Configuration loaded from environment variables.
pub mod config;

/// Error types for proxy-runner operations.
pub mod error;

/// References and their label encoding.
pub mod label;

/// Domain models and filters.
pub mod model;

/// Container runtime abstraction.
pub mod runtime;

/// Runner repository and creator traits.
pub mod runner;

/// IDENTITY and RELAY runner creators.
pub mod creator;

/// Identity row storage.
pub mod store;

/// Identity key files.
pub mod keyfile;

/// VPN provider catalog.
pub mod provider;

/// Public address resolution.
pub mod outgoing;

/// Identity and proxy aggregates.
pub mod aggregate;

/// Component wiring.
pub mod app;

pub use app::ProxyRunner;
pub use config::Config;
pub use error::{Error, Result};
