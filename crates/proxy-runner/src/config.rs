// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for proxy-runner.

use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;

/// Retry policy shared by the runner creators.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of create attempts per call.
    pub max_attempts: u32,
    /// Lower bound of the randomized backoff (inclusive).
    pub backoff_min: Duration,
    /// Upper bound of the randomized backoff (inclusive).
    pub backoff_max: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_min: Duration::from_secs(1),
            backoff_max: Duration::from_secs(4),
        }
    }
}

impl RetryConfig {
    /// Pick a whole-second backoff delay within the configured range.
    pub fn backoff(&self) -> Duration {
        let min = self.backoff_min.as_secs();
        let max = self.backoff_max.as_secs().max(min);
        Duration::from_secs(rand::thread_rng().gen_range(min..=max))
    }
}

/// Settings for the identity (VPN client) container.
#[derive(Debug, Clone)]
pub struct IdentityRunnerConfig {
    /// Container image.
    pub image: String,
    /// Managed network the container is attached to.
    pub network: String,
    /// Control API port exposed by the identity container.
    pub control_port: u16,
    /// Keystore mount point inside the container.
    pub data_volume_path: String,
    /// Local keystore root, as seen by this process.
    pub keystore_dir: PathBuf,
    /// Same directory as seen by the container runtime host, when it differs.
    pub host_keystore_dir: Option<PathBuf>,
    /// Control port connect attempts after a new identity runner starts; 0 skips the wait.
    pub ready_attempts: u32,
    /// Delay between control port connect attempts.
    pub ready_interval: Duration,
}

impl Default for IdentityRunnerConfig {
    fn default() -> Self {
        Self {
            image: "mysteriumnetwork/myst:latest".to_string(),
            network: "proxy-runner".to_string(),
            control_port: 4449,
            data_volume_path: "/var/lib/mysterium-node/keystore".to_string(),
            keystore_dir: PathBuf::from(".data/identities"),
            host_keystore_dir: None,
            ready_attempts: 6,
            ready_interval: Duration::from_secs(2),
        }
    }
}

/// Settings for the relay (TCP forwarder) container.
#[derive(Debug, Clone)]
pub struct RelayRunnerConfig {
    /// Container image.
    pub image: String,
    /// Managed network shared with the identity containers.
    pub network: String,
    /// First public port handed out when none is requested.
    pub start_port: u16,
    /// Port the relay listens on inside its container.
    pub internal_port: u16,
    /// Port reached inside the identity container's network namespace.
    pub forward_port: u16,
}

impl Default for RelayRunnerConfig {
    fn default() -> Self {
        Self {
            image: "alpine/socat:latest".to_string(),
            network: "proxy-runner".to_string(),
            start_port: 3128,
            internal_port: 1234,
            forward_port: 10001,
        }
    }
}

/// Proxy runner configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string for identity rows.
    pub database_url: String,
    /// Prefix of every label written on managed containers and volumes.
    pub label_namespace: String,
    /// Identity container settings.
    pub identity: IdentityRunnerConfig,
    /// Relay container settings.
    pub relay: RelayRunnerConfig,
    /// Creator retry policy.
    pub retry: RetryConfig,
    /// Base URL of the VPN provider API.
    pub provider_api_url: String,
    /// Static public address; resolved over HTTP when unset.
    pub listen_addr: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("PROXY_RUNNER_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .map_err(|_| ConfigError::MissingEnvVar("PROXY_RUNNER_DATABASE_URL or DATABASE_URL"))?;

        let label_namespace = std::env::var("PROXY_RUNNER_LABEL_NAMESPACE")
            .unwrap_or_else(|_| "com.proxy-runner".to_string());

        let network =
            std::env::var("PROXY_RUNNER_NETWORK").unwrap_or_else(|_| "proxy-runner".to_string());

        let identity_defaults = IdentityRunnerConfig::default();
        let identity = IdentityRunnerConfig {
            image: std::env::var("PROXY_RUNNER_IDENTITY_IMAGE").unwrap_or(identity_defaults.image),
            network: network.clone(),
            control_port: parse_port(
                "PROXY_RUNNER_IDENTITY_CONTROL_PORT",
                identity_defaults.control_port,
            )?,
            data_volume_path: std::env::var("PROXY_RUNNER_IDENTITY_DATA_PATH")
                .unwrap_or(identity_defaults.data_volume_path),
            keystore_dir: std::env::var("PROXY_RUNNER_KEYSTORE_DIR")
                .map(PathBuf::from)
                .unwrap_or(identity_defaults.keystore_dir),
            host_keystore_dir: std::env::var("PROXY_RUNNER_HOST_KEYSTORE_DIR")
                .ok()
                .map(PathBuf::from),
            ready_attempts: parse_number(
                "PROXY_RUNNER_IDENTITY_READY_ATTEMPTS",
                identity_defaults.ready_attempts as u64,
            )? as u32,
            ready_interval: Duration::from_secs(parse_number(
                "PROXY_RUNNER_IDENTITY_READY_INTERVAL_SECS",
                identity_defaults.ready_interval.as_secs(),
            )?),
        };

        let relay_defaults = RelayRunnerConfig::default();
        let relay = RelayRunnerConfig {
            image: std::env::var("PROXY_RUNNER_RELAY_IMAGE").unwrap_or(relay_defaults.image),
            network,
            start_port: parse_port("PROXY_RUNNER_RELAY_START_PORT", relay_defaults.start_port)?,
            internal_port: relay_defaults.internal_port,
            forward_port: parse_port(
                "PROXY_RUNNER_RELAY_FORWARD_PORT",
                relay_defaults.forward_port,
            )?,
        };

        let retry_defaults = RetryConfig::default();
        let retry = RetryConfig {
            max_attempts: parse_number(
                "PROXY_RUNNER_CREATE_MAX_ATTEMPTS",
                retry_defaults.max_attempts as u64,
            )?
            .max(1) as u32,
            backoff_min: Duration::from_secs(parse_number(
                "PROXY_RUNNER_BACKOFF_MIN_SECS",
                retry_defaults.backoff_min.as_secs(),
            )?),
            backoff_max: Duration::from_secs(parse_number(
                "PROXY_RUNNER_BACKOFF_MAX_SECS",
                retry_defaults.backoff_max.as_secs(),
            )?),
        };

        let provider_api_url = std::env::var("PROXY_RUNNER_PROVIDER_API_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:4050".to_string());

        let listen_addr = std::env::var("PROXY_RUNNER_LISTEN_ADDR")
            .ok()
            .filter(|v| !v.trim().is_empty());

        Ok(Self {
            database_url,
            label_namespace,
            identity,
            relay,
            retry,
            provider_api_url,
            listen_addr,
        })
    }
}

fn parse_port(var: &'static str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value.parse().map_err(|_| ConfigError::InvalidPort(var)),
        Err(_) => Ok(default),
    }
}

fn parse_number(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value.parse().map_err(|_| ConfigError::InvalidNumber(var)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    /// The port number is invalid.
    #[error("Invalid port number in {0}")]
    InvalidPort(&'static str),
    /// A numeric setting could not be parsed.
    #[error("Invalid number in {0}")]
    InvalidNumber(&'static str),
}
