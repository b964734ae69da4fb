// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live credential supply for outbound account-service calls.

use async_trait::async_trait;
use secrecy::SecretString;

/// Supplies the bearer credential attached to account-service requests.
#[async_trait]
pub trait CredentialProvider: Send + Sync + 'static {
    /// Returns the current credential, or `None` when none is available.
    async fn current_credential(&self) -> Option<SecretString>;

    /// Reports that the account service rejected the credential (401/403).
    /// Implementations rotate; they must not fail the caller.
    async fn report_rejected(&self);
}
