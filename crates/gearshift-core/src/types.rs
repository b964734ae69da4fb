// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the router, the account cache, and the credential store.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Identifier of a backend language model, e.g. `"mid-tier-pro"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(pub String);

impl ModelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Operation category assigned to a request by the classifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum OperationCategory {
    Completion,
    Documentation,
    Syntax,
    Rename,
    Refactor,
    Analysis,
    Unknown,
}

impl OperationCategory {
    /// Categories in the order the classifier evaluates them.
    /// `Unknown` is never matched by a rule.
    pub const EVALUATION_ORDER: [OperationCategory; 6] = [
        OperationCategory::Completion,
        OperationCategory::Documentation,
        OperationCategory::Syntax,
        OperationCategory::Rename,
        OperationCategory::Refactor,
        OperationCategory::Analysis,
    ];
}

/// Subscription and quota snapshot for the current caller.
///
/// Immutable once produced; the cache hands out clones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserState {
    pub is_privileged: bool,
    pub fast_quota_remaining: u64,
    pub total_requests: u64,
    pub accessible_models: BTreeSet<ModelId>,
}

impl UserState {
    /// The fail-open snapshot: unprivileged, no quota, no models.
    pub fn fail_open() -> Self {
        Self::default()
    }

    pub fn has_model_access(&self, model: &ModelId) -> bool {
        self.accessible_models.contains(model)
    }
}

/// Category and token estimate for one request's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationResult {
    pub category: OperationCategory,
    pub token_count: u64,
}

impl ClassificationResult {
    /// Result used when content is missing or classification fails.
    pub const UNKNOWN: ClassificationResult = ClassificationResult {
        category: OperationCategory::Unknown,
        token_count: 0,
    };
}

/// A request entering the router.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    /// Model the caller originally asked for.
    pub model: ModelId,
    #[serde(default)]
    pub code_snippet: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

impl RouteRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: ModelId::new(model),
            code_snippet: None,
            prompt: None,
        }
    }

    pub fn with_code_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.code_snippet = Some(snippet.into());
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Content used for classification: a non-empty code snippet wins over
    /// the prompt. `None` only when both fields are absent.
    pub fn content(&self) -> Option<&str> {
        match (self.code_snippet.as_deref(), self.prompt.as_deref()) {
            (Some(snippet), _) if !snippet.trim().is_empty() => Some(snippet),
            (_, Some(prompt)) => Some(prompt),
            (Some(snippet), None) => Some(snippet),
            (None, None) => None,
        }
    }
}

/// Why the router settled on its selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RoutingOutcome {
    /// Routing disabled in configuration.
    Disabled,
    /// Caller is not on a privileged tier.
    Unprivileged,
    /// Caller still has fast-request quota.
    QuotaAvailable,
    /// A degradation candidate qualified and was substituted.
    Degraded,
    /// No candidate qualified.
    NoCandidate,
    /// Some step failed; the request was passed through.
    Failed,
}

/// Telemetry event emitted once per routed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub original_model: ModelId,
    pub selected_model: ModelId,
    pub category: OperationCategory,
    pub outcome: RoutingOutcome,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl RoutingDecision {
    pub fn is_pass_through(&self) -> bool {
        self.original_model == self.selected_model
    }
}

/// An access credential together with its expiry and provenance.
pub struct Credential {
    pub secret: SecretString,
    pub expires_at: DateTime<Utc>,
    /// Where the credential came from: `keyring`, a file path, `env`, `api`, `refresh`...
    pub source: String,
}

impl Credential {
    pub fn new(secret: impl Into<String>, expires_at: DateTime<Utc>, source: impl Into<String>) -> Self {
        Self {
            secret: SecretString::from(secret.into()),
            expires_at,
            source: source.into(),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn remaining_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        self.expires_at - now
    }

    /// Compares secrets without exposing them outside this crate's callers.
    pub fn same_secret(&self, other: &SecretString) -> bool {
        self.secret.expose_secret() == other.expose_secret()
    }
}

impl Clone for Credential {
    fn clone(&self) -> Self {
        Self {
            secret: SecretString::from(self.secret.expose_secret().to_owned()),
            expires_at: self.expires_at,
            source: self.source.clone(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("secret", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("source", &self.source)
            .finish()
    }
}

/// Lifecycle state of the active credential slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CredentialState {
    /// Nothing attempted yet.
    Unknown,
    /// An unexpired credential passed live validation.
    Valid,
    /// The active credential expired or failed validation.
    Stale,
    /// Searching the rotation list.
    Rotating,
    /// Discovery exhausted every source.
    Missing,
}
