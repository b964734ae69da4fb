// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TTL cache over the account service's status and usage endpoints.
//!
//! The combined entry lives for a fixed TTL. Upstream failures never reach
//! the caller: they produce the fail-open state, which is not cached, so the
//! next call tries again. Concurrent misses coalesce into one fetch, and the
//! whole fetch (credential lookup included) is bounded by the account timeout.
//! A rejected credential is rotated in the background, outside the fetch gate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use gearshift_config::model::{AccountConfig, CacheConfig};
use gearshift_core::{
    AccountService, CredentialProvider, GearshiftError, ModelId, UserState, UserStateSource,
};

#[derive(Debug, Clone)]
struct CachedState {
    state: UserState,
    fetched_at: DateTime<Utc>,
    expires_at: Instant,
}

/// Caches the caller's tier, quota and accessible models.
pub struct UserStateCache {
    account: Arc<dyn AccountService>,
    credentials: Arc<dyn CredentialProvider>,
    /// Lowercased tier names treated as privileged.
    privileged_tiers: Vec<String>,
    ttl: Duration,
    fetch_timeout: Duration,
    entry: RwLock<Option<CachedState>>,
    /// Held by the one task fetching on a miss; others wait, then re-check.
    fetch_gate: Mutex<()>,
    /// Set while a background rotation is running.
    rotating: Arc<AtomicBool>,
}

impl UserStateCache {
    pub fn new(
        account: Arc<dyn AccountService>,
        credentials: Arc<dyn CredentialProvider>,
        account_config: &AccountConfig,
        cache_config: &CacheConfig,
    ) -> Self {
        Self {
            account,
            credentials,
            privileged_tiers: account_config
                .privileged_tiers
                .iter()
                .map(|tier| tier.trim().to_lowercase())
                .filter(|tier| !tier.is_empty())
                .collect(),
            ttl: Duration::from_secs(cache_config.user_state_ttl_secs),
            fetch_timeout: Duration::from_secs(account_config.timeout_secs),
            entry: RwLock::new(None),
            fetch_gate: Mutex::new(()),
            rotating: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Current user state. Never fails; upstream errors yield the fail-open state.
    pub async fn get_user_state(&self) -> UserState {
        if let Some(state) = self.fresh() {
            return state;
        }

        let result = {
            let _gate = self.fetch_gate.lock().await;
            if let Some(state) = self.fresh() {
                debug!("user state filled by a concurrent fetch");
                return state;
            }
            self.fetch().await
        };

        match result {
            Ok(state) => {
                let entry = CachedState {
                    state: state.clone(),
                    fetched_at: Utc::now(),
                    expires_at: Instant::now() + self.ttl,
                };
                *self.entry.write().unwrap_or_else(PoisonError::into_inner) = Some(entry);
                state
            }
            Err(e) => {
                self.handle_failure(&e);
                UserState::fail_open()
            }
        }
    }

    pub async fn has_model_access(&self, model: &ModelId) -> bool {
        self.get_user_state().await.has_model_access(model)
    }

    pub async fn check_privileged_status(&self) -> bool {
        self.get_user_state().await.is_privileged
    }

    pub async fn remaining_quota(&self) -> u64 {
        self.get_user_state().await.fast_quota_remaining
    }

    /// Drop the cached entry so the next call fetches.
    pub fn invalidate(&self) {
        *self.entry.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// When the cached entry was fetched, if one is cached and unexpired.
    pub fn cached_at(&self) -> Option<DateTime<Utc>> {
        self.entry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.fetched_at)
    }

    fn fresh(&self) -> Option<UserState> {
        self.entry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.state.clone())
    }

    async fn fetch(&self) -> Result<UserState, GearshiftError> {
        let reads = async {
            let credential = self.credentials.current_credential().await;
            tokio::try_join!(
                self.account.fetch_status(credential.as_ref()),
                self.account.fetch_usage(credential.as_ref()),
            )
        };
        let (status, usage) = tokio::time::timeout(self.fetch_timeout, reads)
            .await
            .map_err(|_| GearshiftError::Timeout {
                duration: self.fetch_timeout,
            })??;

        let is_privileged = self.privileged_tiers.contains(&status.tier.trim().to_lowercase());
        debug!(
            tier = status.tier.as_str(),
            is_privileged,
            fast_remaining = usage.fast_requests_remaining,
            "fetched user state"
        );

        Ok(UserState {
            is_privileged,
            fast_quota_remaining: usage.fast_requests_remaining,
            total_requests: usage.total_requests,
            accessible_models: status
                .accessible_models
                .into_iter()
                .map(ModelId::new)
                .collect(),
        })
    }

    fn handle_failure(&self, error: &GearshiftError) {
        if error.is_credential_invalid() {
            warn!(error = %error, "account service rejected credential, requesting rotation");
            self.spawn_rotation();
        } else if error.is_quota_signal() {
            warn!(error = %error, "account service quota exceeded, backing off");
            metrics::counter!("gearshift_quota_signals_total").increment(1);
        } else {
            warn!(error = %error, "account service unavailable, using fail-open user state");
        }
    }

    /// At most one rotation runs at a time; rejections seen meanwhile fold into it.
    fn spawn_rotation(&self) {
        if self.rotating.swap(true, Ordering::AcqRel) {
            debug!("credential rotation already running");
            return;
        }
        let credentials = Arc::clone(&self.credentials);
        let clear = ClearOnDrop(Arc::clone(&self.rotating));
        tokio::spawn(async move {
            let _clear = clear;
            credentials.report_rejected().await;
        });
    }

    /// Whether a rotation started by a rejected fetch is still running.
    pub fn is_rotating(&self) -> bool {
        self.rotating.load(Ordering::Acquire)
    }
}

struct ClearOnDrop(Arc<AtomicBool>);

impl Drop for ClearOnDrop {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[async_trait]
impl UserStateSource for UserStateCache {
    async fn user_state(&self) -> UserState {
        self.get_user_state().await
    }
}
