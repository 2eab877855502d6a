// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for proxy-runner.

use thiserror::Error;

/// Proxy runner errors.
///
/// `Runtime`, `Database`, `Io`, `Http` and `Json` form the repository failure
/// class: they wrap an unclassified collaborator error and carry the original
/// cause. Everything else is a domain outcome the caller is expected to act on.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// A required reference field is still a placeholder.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// A reference or record the operation needs does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A dependency exists but is not a running container.
    #[error("Service is not running: {0}")]
    NotRunning(String),

    /// A record with the same unique key already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The record is still referenced by a live session.
    #[error("In use: {0}")]
    InUse(String),

    /// The requested host port is already allocated.
    #[error("Port {0} is already in use")]
    PortInUse(u16),

    /// The managed network has no free address left.
    #[error("No free address left in network {0}")]
    PoolExhausted(String),

    /// Container runtime operation failed.
    #[error("Container runtime error: {0}")]
    Runtime(#[from] crate::runtime::RuntimeError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request to an external API failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A retry loop finished without capturing a cause.
    #[error("Unknown failure")]
    Unknown,
}

impl Error {
    /// Whether this error wraps an unclassified collaborator failure.
    pub fn is_repository_failure(&self) -> bool {
        matches!(
            self,
            Error::Runtime(_) | Error::Database(_) | Error::Io(_) | Error::Http(_) | Error::Json(_)
        )
    }
}

/// Result type using proxy-runner Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_names_field() {
        let err = Error::MissingField("passphrase".to_string());
        assert_eq!(err.to_string(), "Missing required field: passphrase");
    }

    #[test]
    fn test_port_in_use_message() {
        let err = Error::PortInUse(8080);
        assert!(err.to_string().contains("8080"));
    }

    #[test]
    fn test_repository_failure_class() {
        let io = Error::Io(std::io::Error::other("disk gone"));
        assert!(io.is_repository_failure());
        assert!(!Error::Unknown.is_repository_failure());
        assert!(!Error::PoolExhausted("net".into()).is_repository_failure());
    }
}
