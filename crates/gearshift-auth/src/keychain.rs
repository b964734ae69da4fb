// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OS keychain backing for the active access token.
//!
//! macOS Keychain, Windows Credential Manager, or the Secret Service on
//! Linux. Keychain calls block, so each one runs on the blocking pool.

use async_trait::async_trait;
use keyring::Entry;

use gearshift_config::model::CredentialsConfig;
use gearshift_core::{GearshiftError, SecretStore};

/// [`SecretStore`] over a single keychain entry.
#[derive(Debug, Clone)]
pub struct KeyringSecretStore {
    service: String,
    user: String,
}

impl KeyringSecretStore {
    pub fn new(service: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            user: user.into(),
        }
    }

    pub fn from_config(config: &CredentialsConfig) -> Self {
        Self::new(&config.keyring_service, &config.keyring_user)
    }

    fn entry(&self) -> Result<Entry, GearshiftError> {
        Entry::new(&self.service, &self.user).map_err(GearshiftError::storage)
    }
}

fn join_error(e: tokio::task::JoinError) -> GearshiftError {
    GearshiftError::Internal(format!("keychain task failed: {e}"))
}

#[async_trait]
impl SecretStore for KeyringSecretStore {
    fn name(&self) -> &str {
        "keyring"
    }

    async fn load(&self) -> Result<Option<String>, GearshiftError> {
        let entry = self.entry()?;
        let result = tokio::task::spawn_blocking(move || entry.get_password())
            .await
            .map_err(join_error)?;
        match result {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(GearshiftError::storage(e)),
        }
    }

    async fn store(&self, token: &str) -> Result<(), GearshiftError> {
        let entry = self.entry()?;
        let token = token.to_string();
        tokio::task::spawn_blocking(move || entry.set_password(&token))
            .await
            .map_err(join_error)?
            .map_err(GearshiftError::storage)
    }
}
