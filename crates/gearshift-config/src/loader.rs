// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./gearshift.toml` > `~/.config/gearshift/gearshift.toml` >
//! `/etc/gearshift/gearshift.toml` with environment variable overrides via `GEARSHIFT_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::GearshiftConfig;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/gearshift/gearshift.toml";

/// Configuration file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "gearshift.toml";

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/gearshift/gearshift.toml` (system-wide)
/// 3. `~/.config/gearshift/gearshift.toml` (user XDG config)
/// 4. `./gearshift.toml` (local directory)
/// 5. `GEARSHIFT_*` environment variables
pub fn load_config() -> Result<GearshiftConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env vars).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<GearshiftConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GearshiftConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<GearshiftConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GearshiftConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(GearshiftConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("gearshift/gearshift.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` because key names contain
/// underscores: `GEARSHIFT_ACCOUNT_BASE_URL` must map to `account.base_url`,
/// not `account.base.url`. The credential variables share the prefix and are
/// ignored here; the credential store reads them directly.
pub fn env_provider() -> Env {
    Env::prefixed("GEARSHIFT_")
        .ignore(&["access_token", "api_token"])
        .map(|key| {
            // `key` is the lowercased env var name with prefix stripped.
            // Example: GEARSHIFT_CACHE_USER_STATE_TTL_SECS -> "cache_user_state_ttl_secs"
            let key_str = key.as_str();
            let mapped = key_str
                .replacen("logging_", "logging.", 1)
                .replacen("account_", "account.", 1)
                .replacen("cache_", "cache.", 1)
                .replacen("metrics_", "metrics.", 1)
                .replacen("routing_", "routing.", 1)
                .replacen("credentials_", "credentials.", 1)
                .replacen("classifier_", "classifier.", 1);
            mapped.into()
        })
}
