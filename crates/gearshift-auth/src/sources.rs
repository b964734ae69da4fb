// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential discovery sources, consulted in order when the rotation list
//! has nothing usable.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::Value;
use tracing::{debug, warn};

use gearshift_config::model::CredentialsConfig;
use gearshift_core::{AccountService, GearshiftError, SecretStore};

/// A token found by a source, tagged with where it came from.
pub struct Candidate {
    pub secret: SecretString,
    pub source: String,
}

impl Candidate {
    pub fn new(secret: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            secret: SecretString::from(secret.into()),
            source: source.into(),
        }
    }
}

impl std::fmt::Debug for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Candidate")
            .field("secret", &"[REDACTED]")
            .field("source", &self.source)
            .finish()
    }
}

/// One place a credential may be found.
#[async_trait]
pub trait CredentialSource: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Tokens this source currently offers, best first.
    async fn candidates(&self) -> Result<Vec<Candidate>, GearshiftError>;

    /// Whether candidates must pass a live probe before use.
    fn requires_probe(&self) -> bool {
        true
    }
}

/// The platform secure store.
pub struct SecureStoreSource {
    store: Arc<dyn SecretStore>,
}

impl SecureStoreSource {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CredentialSource for SecureStoreSource {
    fn name(&self) -> &str {
        self.store.name()
    }

    async fn candidates(&self) -> Result<Vec<Candidate>, GearshiftError> {
        Ok(self
            .store
            .load()
            .await?
            .filter(|token| !token.trim().is_empty())
            .map(|token| Candidate::new(token.trim(), self.store.name()))
            .into_iter()
            .collect())
    }
}

/// Well-known JSON files carrying `token` or `tokens[0].token`.
pub struct FileSource {
    paths: Vec<PathBuf>,
}

impl FileSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

/// Pull a token out of a credential file body.
fn token_from_json(raw: &str) -> Result<Option<String>, serde_json::Error> {
    let value: Value = serde_json::from_str(raw)?;
    let token = value
        .get("token")
        .and_then(Value::as_str)
        .or_else(|| {
            value
                .get("tokens")
                .and_then(|tokens| tokens.get(0))
                .and_then(|first| first.get("token"))
                .and_then(Value::as_str)
        })
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string);
    Ok(token)
}

#[async_trait]
impl CredentialSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn candidates(&self) -> Result<Vec<Candidate>, GearshiftError> {
        let mut found = Vec::new();
        for path in &self.paths {
            let raw = match tokio::fs::read_to_string(path).await {
                Ok(raw) => raw,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "credential file unreadable, skipping");
                    continue;
                }
            };
            match token_from_json(&raw) {
                Ok(Some(token)) => {
                    debug!(path = %path.display(), "credential file offers a token");
                    found.push(Candidate::new(token, path.display().to_string()));
                }
                Ok(None) => debug!(path = %path.display(), "credential file has no token"),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "credential file malformed, skipping");
                }
            }
        }
        Ok(found)
    }
}

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Environment variables, in order.
pub struct EnvSource {
    vars: Vec<String>,
    lookup: EnvLookup,
}

impl EnvSource {
    pub fn new(vars: Vec<String>) -> Self {
        Self::with_lookup(vars, Arc::new(|name: &str| std::env::var(name).ok()))
    }

    /// Reads variables through `lookup` instead of the process environment.
    pub fn with_lookup(vars: Vec<String>, lookup: EnvLookup) -> Self {
        Self { vars, lookup }
    }
}

#[async_trait]
impl CredentialSource for EnvSource {
    fn name(&self) -> &str {
        "env"
    }

    async fn candidates(&self) -> Result<Vec<Candidate>, GearshiftError> {
        Ok(self
            .vars
            .iter()
            .filter_map(|var| {
                (self.lookup)(var)
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
                    .map(|value| Candidate::new(value, format!("env:{var}")))
            })
            .collect())
    }
}

/// Asks the account service to issue a fresh token.
pub struct IssuerSource {
    account: Arc<dyn AccountService>,
}

impl IssuerSource {
    pub fn new(account: Arc<dyn AccountService>) -> Self {
        Self { account }
    }
}

#[async_trait]
impl CredentialSource for IssuerSource {
    fn name(&self) -> &str {
        "api"
    }

    async fn candidates(&self) -> Result<Vec<Candidate>, GearshiftError> {
        let secret = self.account.issue_token(None).await?;
        Ok(vec![Candidate {
            secret,
            source: "api".to_string(),
        }])
    }

    fn requires_probe(&self) -> bool {
        false
    }
}

/// The standard discovery chain: secure store, files, environment, issuer.
pub fn default_sources(
    account: Arc<dyn AccountService>,
    secure_store: Option<Arc<dyn SecretStore>>,
    config: &CredentialsConfig,
) -> Vec<Arc<dyn CredentialSource>> {
    let mut sources: Vec<Arc<dyn CredentialSource>> = Vec::new();
    if let Some(store) = secure_store {
        sources.push(Arc::new(SecureStoreSource::new(store)));
    }
    sources.push(Arc::new(FileSource::new(config.search_paths.clone())));
    sources.push(Arc::new(EnvSource::new(config.env_vars.clone())));
    sources.push(Arc::new(IssuerSource::new(account)));
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use gearshift_test_utils::{MemorySecretStore, MockAccountService};
    use secrecy::ExposeSecret;

    fn exposed(candidates: &[Candidate]) -> Vec<(String, String)> {
        candidates
            .iter()
            .map(|c| (c.secret.expose_secret().to_string(), c.source.clone()))
            .collect()
    }

    #[test]
    fn token_field_shapes() {
        assert_eq!(
            token_from_json(r#"{"token":" abc "}"#).unwrap().as_deref(),
            Some("abc")
        );
        assert_eq!(
            token_from_json(r#"{"tokens":[{"token":"first"},{"token":"second"}]}"#)
                .unwrap()
                .as_deref(),
            Some("first")
        );
        assert_eq!(token_from_json(r#"{"token":""}"#).unwrap(), None);
        assert_eq!(token_from_json(r#"{"other":1}"#).unwrap(), None);
        assert!(token_from_json("nope").is_err());
    }

    #[tokio::test]
    async fn file_source_skips_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.json");
        let good = dir.path().join("config.json");
        std::fs::write(&broken, "{{{").unwrap();
        std::fs::write(&good, r#"{"token":"from-file"}"#).unwrap();

        let source = FileSource::new(vec![dir.path().join("absent.json"), broken, good.clone()]);
        let found = source.candidates().await.unwrap();
        assert_eq!(
            exposed(&found),
            vec![("from-file".to_string(), good.display().to_string())]
        );
    }

    #[tokio::test]
    async fn env_source_uses_lookup_in_order() {
        let source = EnvSource::with_lookup(
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
            Arc::new(|name: &str| match name {
                "A" => Some("  ".to_string()),
                "B" => Some("tok-b".to_string()),
                "C" => Some("tok-c".to_string()),
                _ => None,
            }),
        );
        let found = source.candidates().await.unwrap();
        assert_eq!(
            exposed(&found),
            vec![
                ("tok-b".to_string(), "env:B".to_string()),
                ("tok-c".to_string(), "env:C".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn secure_store_source_tags_with_store_name() {
        let source = SecureStoreSource::new(Arc::new(MemorySecretStore::with_token("kc")));
        let found = source.candidates().await.unwrap();
        assert_eq!(exposed(&found), vec![("kc".to_string(), "memory".to_string())]);

        let empty = SecureStoreSource::new(Arc::new(MemorySecretStore::new()));
        assert!(empty.candidates().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn issuer_source_skips_probe() {
        let account = Arc::new(MockAccountService::new());
        account.queue_issued_token("issued").await;
        let source = IssuerSource::new(account.clone());
        assert!(!source.requires_probe());
        let found = source.candidates().await.unwrap();
        assert_eq!(exposed(&found), vec![("issued".to_string(), "api".to_string())]);
        assert!(source.candidates().await.is_err());
    }

    #[test]
    fn default_chain_order() {
        let account: Arc<dyn AccountService> = Arc::new(MockAccountService::new());
        let store: Arc<dyn SecretStore> = Arc::new(MemorySecretStore::new());
        let config = CredentialsConfig::default();

        let names: Vec<String> = default_sources(account.clone(), Some(store), &config)
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["memory", "file", "env", "api"]);

        assert_eq!(default_sources(account, None, &config).len(), 3);
    }
}
