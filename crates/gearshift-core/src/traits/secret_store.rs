// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform secure secret storage (OS keychain or equivalent).

use async_trait::async_trait;

use crate::error::GearshiftError;

/// A single-slot secure store for the active access token.
#[async_trait]
pub trait SecretStore: Send + Sync + 'static {
    /// Short name used in logs and as the credential source tag.
    fn name(&self) -> &str;

    /// Reads the stored token. `Ok(None)` when the slot is empty.
    async fn load(&self) -> Result<Option<String>, GearshiftError>;

    /// Overwrites the stored token.
    async fn store(&self, token: &str) -> Result<(), GearshiftError>;
}
