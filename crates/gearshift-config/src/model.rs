// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Gearshift model router.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level Gearshift configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GearshiftConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Account service connection settings.
    #[serde(default)]
    pub account: AccountConfig,

    /// User-state cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Latency sample store settings.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Routing behavior switches.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Credential discovery, persistence and refresh settings.
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Operator-supplied classifier rules.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Per-model policy table, keyed by model id. Empty means the built-in table.
    #[serde(default)]
    pub models: BTreeMap<String, ModelPolicyConfig>,
}

impl GearshiftConfig {
    /// The policy table in force: the configured one, or the built-in
    /// table when no `[models.*]` entries are present.
    pub fn models_or_builtin(&self) -> BTreeMap<String, ModelPolicyConfig> {
        if self.models.is_empty() {
            builtin_models()
        } else {
            self.models.clone()
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Account service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AccountConfig {
    /// Base URL of the account service, without trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,

    /// Tier names treated as privileged (compared case-insensitively).
    #[serde(default = "default_privileged_tiers")]
    pub privileged_tiers: Vec<String>,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_request_timeout_secs(),
            privileged_tiers: default_privileged_tiers(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.gearshift.dev/v1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    5
}

fn default_privileged_tiers() -> Vec<String> {
    vec!["pro".to_string()]
}

/// User-state cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Lifetime of the combined status+usage entry in seconds.
    #[serde(default = "default_user_state_ttl_secs")]
    pub user_state_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            user_state_ttl_secs: default_user_state_ttl_secs(),
        }
    }
}

fn default_user_state_ttl_secs() -> u64 {
    300 // 5 minutes
}

/// Latency sample store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Samples kept per model before the oldest is evicted.
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            max_samples: default_max_samples(),
        }
    }
}

fn default_max_samples() -> usize {
    100
}

/// Routing behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Enable routing. When false, every request keeps its original model.
    #[serde(default = "default_routing_enabled")]
    pub enabled: bool,

    /// Pass privileged callers through while they still have fast-request
    /// quota, without consulting the classifier.
    #[serde(default = "default_pass_through_while_quota_remains")]
    pub pass_through_while_quota_remains: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            enabled: default_routing_enabled(),
            pass_through_while_quota_remains: default_pass_through_while_quota_remains(),
        }
    }
}

fn default_routing_enabled() -> bool {
    true
}

fn default_pass_through_while_quota_remains() -> bool {
    true
}

/// Credential discovery, persistence and refresh configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsConfig {
    /// JSON file holding the rotation list (newest first).
    #[serde(default = "default_rotation_file")]
    pub rotation_file: PathBuf,

    /// Maximum entries kept in the rotation file.
    #[serde(default = "default_rotation_capacity")]
    pub rotation_capacity: usize,

    /// Well-known JSON files searched for a `token` or `tokens[0].token` field, in order.
    #[serde(default = "default_search_paths")]
    pub search_paths: Vec<PathBuf>,

    /// Environment variables consulted for a token, in order.
    #[serde(default = "default_env_vars")]
    pub env_vars: Vec<String>,

    /// Use the OS keychain as the first discovery source and as a persistence target.
    #[serde(default = "default_keyring_enabled")]
    pub keyring_enabled: bool,

    /// Keychain service name.
    #[serde(default = "default_keyring_service")]
    pub keyring_service: String,

    /// Keychain account name.
    #[serde(default = "default_keyring_user")]
    pub keyring_user: String,

    /// Lifetime stamped on newly saved credentials, in seconds.
    #[serde(default = "default_token_lifetime_secs")]
    pub token_lifetime_secs: u64,

    /// Refresh timer period in seconds. A credential with less remaining
    /// lifetime than this is refreshed proactively.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Timeout for local file and keychain reads, in seconds.
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            rotation_file: default_rotation_file(),
            rotation_capacity: default_rotation_capacity(),
            search_paths: default_search_paths(),
            env_vars: default_env_vars(),
            keyring_enabled: default_keyring_enabled(),
            keyring_service: default_keyring_service(),
            keyring_user: default_keyring_user(),
            token_lifetime_secs: default_token_lifetime_secs(),
            refresh_interval_secs: default_refresh_interval_secs(),
            io_timeout_secs: default_io_timeout_secs(),
        }
    }
}

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_rotation_file() -> PathBuf {
    home().join(".gearshift").join("tokens.json")
}

fn default_rotation_capacity() -> usize {
    3
}

fn default_search_paths() -> Vec<PathBuf> {
    let home = home();
    let mut paths = vec![home.join(".gearshift").join("config.json")];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("gearshift").join("config.json"));
    }
    let xdg_fallback = home.join(".config").join("gearshift").join("config.json");
    if !paths.contains(&xdg_fallback) {
        paths.push(xdg_fallback);
    }
    paths.push(home.join(".gearshift").join("tokens.json"));
    paths.push(home.join(".gearshift-tokens"));
    paths
}

fn default_env_vars() -> Vec<String> {
    vec![
        "GEARSHIFT_ACCESS_TOKEN".to_string(),
        "GEARSHIFT_API_TOKEN".to_string(),
    ]
}

fn default_keyring_enabled() -> bool {
    true
}

fn default_keyring_service() -> String {
    "gearshift".to_string()
}

fn default_keyring_user() -> String {
    "api-token".to_string()
}

fn default_token_lifetime_secs() -> u64 {
    86_400 // 24 hours
}

fn default_refresh_interval_secs() -> u64 {
    1_800 // 30 minutes
}

fn default_io_timeout_secs() -> u64 {
    5
}

/// Operator-supplied classifier rules.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierConfig {
    /// Extra regex rules, appended after the built-in rules of their category.
    #[serde(default)]
    pub extra_rules: Vec<ClassifierRuleConfig>,
}

/// One extra classifier rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierRuleConfig {
    /// Category name (completion, documentation, syntax, rename, refactor, analysis).
    pub category: String,
    /// Regular expression tested against the request content.
    pub pattern: String,
}

/// Static routing policy for one model.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelPolicyConfig {
    /// Evaluation order; lower is preferred.
    pub priority: u32,

    /// Advertised average latency, informational only.
    #[serde(default)]
    pub average_latency_ms: u64,

    /// Cost per token in USD.
    #[serde(default)]
    pub cost_per_token: f64,

    /// Context window size in tokens.
    #[serde(default)]
    pub context_window: u64,

    /// Free-text notes on what the model is good at.
    #[serde(default)]
    pub best_for: Vec<String>,

    /// Rules under which this model may replace the requested one.
    /// Models without rules are never substituted in.
    #[serde(default)]
    pub degradation: Option<DegradationConfig>,
}

/// Degradation rules gating substitution.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DegradationConfig {
    /// Upper bound on the model's current mean latency.
    pub max_latency_ms: u64,
    /// Inclusive lower bound on the request's token estimate.
    #[serde(default)]
    pub min_tokens: u64,
    /// Inclusive upper bound on the request's token estimate.
    pub max_tokens: u64,
    /// Operation categories this model accepts.
    pub preferred_categories: Vec<String>,
}

/// The built-in policy table: a high-capability model without degradation
/// rules, a mid-tier model that accepts light operations, and a fast model.
pub fn builtin_models() -> BTreeMap<String, ModelPolicyConfig> {
    let mut models = BTreeMap::new();
    models.insert(
        "claude-3.7-sonnet".to_string(),
        ModelPolicyConfig {
            priority: 1,
            average_latency_ms: 15_000,
            cost_per_token: 0.0008,
            context_window: 200_000,
            best_for: vec![
                "algorithm design".to_string(),
                "system architecture".to_string(),
                "multi-file refactoring".to_string(),
                "deep code analysis".to_string(),
            ],
            degradation: None,
        },
    );
    models.insert(
        "gemini-2.5-pro".to_string(),
        ModelPolicyConfig {
            priority: 2,
            average_latency_ms: 8_000,
            cost_per_token: 0.0002,
            context_window: 128_000,
            best_for: vec![
                "code completion".to_string(),
                "simple refactoring".to_string(),
                "documentation".to_string(),
                "syntax checks".to_string(),
                "single-line comments".to_string(),
            ],
            degradation: Some(DegradationConfig {
                max_latency_ms: 12_000,
                min_tokens: 50,
                max_tokens: 4_000,
                preferred_categories: vec![
                    "completion".to_string(),
                    "documentation".to_string(),
                    "syntax".to_string(),
                    "rename".to_string(),
                ],
            }),
        },
    );
    models.insert(
        "claude-3.5-sonnet".to_string(),
        ModelPolicyConfig {
            priority: 3,
            average_latency_ms: 5_000,
            cost_per_token: 0.0001,
            context_window: 100_000,
            best_for: vec![
                "code completion".to_string(),
                "small edits".to_string(),
                "doc comments".to_string(),
                "basic queries".to_string(),
            ],
            degradation: None,
        },
    );
    models
}
