//! Error types for the OAuth callback server
//!
//! This module defines the crate-level error type used for startup,
//! configuration, and server lifecycle failures, using `thiserror` for
//! ergonomic error handling.
//!
//! Failures of an individual callback request are *not* represented here;
//! they are normalized into a redirect via
//! [`FailureKind`](crate::callback::outcome::FailureKind).

use thiserror::Error;

/// Main error type for the OAuth callback server
///
/// Covers everything that can go wrong outside of a single callback
/// request: loading and validating configuration, building the HTTP
/// client, and binding or running the listener.
#[derive(Error, Debug)]
pub enum CallbackError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Listener and server lifecycle errors
    #[error("Server error: {0}")]
    Server(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client construction errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type alias for crate operations
///
/// Uses `anyhow::Error` as the error type so callers can attach context
/// while still downcasting to [`CallbackError`] when needed.
pub type Result<T> = anyhow::Result<T>;
