// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Gearshift model router.
//!
//! Every variant is recoverable from the router's point of view. The
//! boundaries that must never fail (`route`, `get_user_state`, the credential
//! refresh tick) convert these into safe defaults.

use thiserror::Error;

/// The primary error type shared by all Gearshift crates.
#[derive(Debug, Error)]
pub enum GearshiftError {
    /// The account service could not be reached, timed out, returned a 5xx,
    /// or sent a body we could not parse.
    #[error("account service unavailable: {message}")]
    UpstreamUnavailable {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The account service rejected the credential (401/403) or a local
    /// validation probe failed.
    #[error("credential rejected: {message}")]
    CredentialInvalid { message: String },

    /// The account service answered 429. Transient; never triggers rotation.
    #[error("request quota exceeded: {message}")]
    QuotaExceeded { message: String },

    /// A local credential file or a single policy entry could not be parsed.
    #[error("malformed configuration: {message}")]
    ConfigMalformed { message: String },

    /// Configuration errors that make a whole service unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// Durable storage errors (rotation file, secure secret store).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Every discovery source was exhausted without a usable credential.
    #[error("no usable credential found")]
    NoCredential,

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GearshiftError {
    /// Convenience constructor for upstream failures without a source error.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps any error as a storage failure.
    pub fn storage(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage {
            source: Box::new(source),
        }
    }

    /// True when the error should trigger credential rotation.
    pub fn is_credential_invalid(&self) -> bool {
        matches!(self, Self::CredentialInvalid { .. })
    }

    /// True when the error is a transient quota signal (HTTP 429).
    pub fn is_quota_signal(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}
