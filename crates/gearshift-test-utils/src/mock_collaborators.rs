// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Small in-memory collaborators: secret store, decision sink, user-state
//! source and credential provider.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::Mutex;

use gearshift_core::{
    CredentialProvider, DecisionSink, GearshiftError, ModelId, RoutingDecision, SecretStore,
    UserState, UserStateSource,
};

/// In-memory [`SecretStore`] standing in for the OS keychain.
pub struct MemorySecretStore {
    slot: Mutex<Option<String>>,
    failing: AtomicBool,
    store_calls: AtomicUsize,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            failing: AtomicBool::new(false),
            store_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            slot: Mutex::new(Some(token.to_string())),
            ..Self::new()
        }
    }

    /// Make every load and store fail, as a locked keychain would.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn stored(&self) -> Option<String> {
        self.slot.lock().await.clone()
    }

    pub fn store_calls(&self) -> usize {
        self.store_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), GearshiftError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(GearshiftError::storage(std::io::Error::other(
                "memory store unavailable",
            )))
        } else {
            Ok(())
        }
    }
}

impl Default for MemorySecretStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self) -> Result<Option<String>, GearshiftError> {
        self.check()?;
        Ok(self.slot.lock().await.clone())
    }

    async fn store(&self, token: &str) -> Result<(), GearshiftError> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        *self.slot.lock().await = Some(token.to_string());
        Ok(())
    }
}

/// A [`DecisionSink`] that keeps every decision it receives.
#[derive(Default)]
pub struct RecordingSink {
    decisions: StdMutex<Vec<RoutingDecision>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decisions(&self) -> Vec<RoutingDecision> {
        self.decisions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.decisions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<RoutingDecision> {
        self.decisions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl DecisionSink for RecordingSink {
    fn record(&self, decision: &RoutingDecision) {
        self.decisions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(decision.clone());
    }
}

/// A [`UserStateSource`] that always answers with the same state.
pub struct StaticUserState {
    state: StdMutex<UserState>,
    calls: AtomicUsize,
}

impl StaticUserState {
    pub fn new(state: UserState) -> Self {
        Self {
            state: StdMutex::new(state),
            calls: AtomicUsize::new(0),
        }
    }

    /// A privileged caller with the given fast quota.
    pub fn privileged(fast_quota_remaining: u64) -> Self {
        Self::new(UserState {
            is_privileged: true,
            fast_quota_remaining,
            ..UserState::default()
        })
    }

    pub fn unprivileged() -> Self {
        Self::new(UserState::default())
    }

    pub fn set(&self, state: UserState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn grant_model(&self, model: &str) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .accessible_models
            .insert(ModelId::new(model));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserStateSource for StaticUserState {
    async fn user_state(&self) -> UserState {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// A [`CredentialProvider`] holding one fixed token.
pub struct StaticCredentials {
    token: Mutex<Option<String>>,
    rejections: AtomicUsize,
}

impl StaticCredentials {
    pub fn new(token: Option<&str>) -> Self {
        Self {
            token: Mutex::new(token.map(str::to_string)),
            rejections: AtomicUsize::new(0),
        }
    }

    pub fn rejections(&self) -> usize {
        self.rejections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn current_credential(&self) -> Option<SecretString> {
        self.token.lock().await.clone().map(SecretString::from)
    }

    async fn report_rejected(&self) {
        self.rejections.fetch_add(1, Ordering::SeqCst);
    }
}
