// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Only constraints that make a whole service unusable are checked here.
//! Problems confined to one `[models.*]` entry or one classifier rule are
//! not fatal: the router skips that entry with a warning and keeps the rest.

use crate::diagnostic::ConfigError;
use crate::model::GearshiftConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every violation instead of failing fast.
pub fn validate_config(config: &GearshiftConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let base_url = config.account.base_url.trim();
    if base_url.is_empty() {
        errors.push(ConfigError::validation("account.base_url must not be empty"));
    } else if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        errors.push(ConfigError::validation(format!(
            "account.base_url `{base_url}` must start with http:// or https://"
        )));
    }

    if config.account.timeout_secs == 0 {
        errors.push(ConfigError::validation("account.timeout_secs must be at least 1"));
    }

    if config
        .account
        .privileged_tiers
        .iter()
        .all(|tier| tier.trim().is_empty())
    {
        errors.push(ConfigError::validation(
            "account.privileged_tiers must name at least one tier",
        ));
    }

    if config.cache.user_state_ttl_secs == 0 {
        errors.push(ConfigError::validation(
            "cache.user_state_ttl_secs must be at least 1",
        ));
    }

    if config.metrics.max_samples == 0 {
        errors.push(ConfigError::validation("metrics.max_samples must be at least 1"));
    }

    let creds = &config.credentials;
    if creds.rotation_capacity == 0 {
        errors.push(ConfigError::validation(
            "credentials.rotation_capacity must be at least 1",
        ));
    }
    if creds.rotation_file.as_os_str().is_empty() {
        errors.push(ConfigError::validation(
            "credentials.rotation_file must not be empty",
        ));
    }
    for (name, value) in [
        ("token_lifetime_secs", creds.token_lifetime_secs),
        ("refresh_interval_secs", creds.refresh_interval_secs),
        ("io_timeout_secs", creds.io_timeout_secs),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(format!(
                "credentials.{name} must be at least 1"
            )));
        }
    }
    if creds.keyring_enabled
        && (creds.keyring_service.trim().is_empty() || creds.keyring_user.trim().is_empty())
    {
        errors.push(ConfigError::validation(
            "credentials.keyring_service and credentials.keyring_user must be set when the keyring is enabled",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
