// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The external account service, treated as an opaque collaborator.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::GearshiftError;

/// Subscription tier and model access as reported by `GET /user/status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountStatus {
    pub tier: String,
    pub accessible_models: Vec<String>,
}

/// Quota counters as reported by `GET /user/usage`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountUsage {
    pub fast_requests_remaining: u64,
    pub total_requests: u64,
}

/// Request/response calls against the account service.
///
/// Implementations map HTTP 401/403 to [`GearshiftError::CredentialInvalid`],
/// 429 to [`GearshiftError::QuotaExceeded`], and everything else that is not a
/// success to [`GearshiftError::UpstreamUnavailable`].
#[async_trait]
pub trait AccountService: Send + Sync + 'static {
    /// Fetches the caller's tier and accessible models.
    async fn fetch_status(
        &self,
        credential: Option<&SecretString>,
    ) -> Result<AccountStatus, GearshiftError>;

    /// Fetches the caller's fast-request quota and request counters.
    async fn fetch_usage(
        &self,
        credential: Option<&SecretString>,
    ) -> Result<AccountUsage, GearshiftError>;

    /// Lightweight authenticated probe. Any non-success is an error.
    async fn probe(&self, credential: &SecretString) -> Result<(), GearshiftError>;

    /// Requests a newly issued credential.
    async fn issue_token(
        &self,
        credential: Option<&SecretString>,
    ) -> Result<SecretString, GearshiftError>;
}
