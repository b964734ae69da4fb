// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The credential store.
//!
//! Holds one active credential. [`CredentialStore::get_token`] validates it
//! lazily with a live probe; when it is expired or rejected the store walks
//! the persisted rotation list, then the discovery sources. A background task
//! refreshes the credential ahead of expiry.
//!
//! The active slot and the rotation file change together under one async
//! mutex that is never held across a network call. Each write bumps a
//! generation counter; a writer that finds the generation moved since it
//! started searching yields to the newer credential.

use std::sync::{Arc, Mutex as StdMutex, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use gearshift_config::model::CredentialsConfig;
use gearshift_core::{
    AccountService, Credential, CredentialProvider, CredentialState, GearshiftError, SecretStore,
};

use crate::keychain::KeyringSecretStore;
use crate::rotation::RotationFile;
use crate::sources::{default_sources, CredentialSource};

const ROTATIONS_COUNTER: &str = "gearshift_credential_rotations_total";

struct Slot {
    active: Option<Credential>,
    generation: u64,
}

struct RefreshTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

fn copy_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_owned())
}

/// Owns the active access token and its lifecycle.
pub struct CredentialStore {
    account: Arc<dyn AccountService>,
    sources: Vec<Arc<dyn CredentialSource>>,
    secure_store: Option<Arc<dyn SecretStore>>,
    rotation: RotationFile,
    slot: Mutex<Slot>,
    state: watch::Sender<CredentialState>,
    token_lifetime: chrono::Duration,
    refresh_interval: Duration,
    io_timeout: Duration,
    refresh: StdMutex<Option<RefreshTask>>,
}

impl CredentialStore {
    /// Store with the standard discovery chain, backed by the OS keychain
    /// when enabled.
    pub fn new(account: Arc<dyn AccountService>, config: &CredentialsConfig) -> Self {
        let secure_store: Option<Arc<dyn SecretStore>> = if config.keyring_enabled {
            Some(Arc::new(KeyringSecretStore::from_config(config)))
        } else {
            None
        };
        let sources = default_sources(Arc::clone(&account), secure_store.clone(), config);
        Self::with_sources(account, sources, secure_store, config)
    }

    /// Store with an explicit discovery chain and secure store.
    pub fn with_sources(
        account: Arc<dyn AccountService>,
        sources: Vec<Arc<dyn CredentialSource>>,
        secure_store: Option<Arc<dyn SecretStore>>,
        config: &CredentialsConfig,
    ) -> Self {
        let token_lifetime = chrono::Duration::from_std(Duration::from_secs(
            config.token_lifetime_secs,
        ))
        .unwrap_or(chrono::Duration::MAX);

        Self {
            account,
            sources,
            secure_store,
            rotation: RotationFile::new(&config.rotation_file, config.rotation_capacity),
            slot: Mutex::new(Slot {
                active: None,
                generation: 0,
            }),
            state: watch::Sender::new(CredentialState::Unknown),
            token_lifetime,
            refresh_interval: Duration::from_secs(config.refresh_interval_secs.max(1)),
            io_timeout: Duration::from_secs(config.io_timeout_secs.max(1)),
            refresh: StdMutex::new(None),
        }
    }

    /// A usable access token.
    ///
    /// Returns the active credential when it is unexpired and passes a live
    /// probe; otherwise rotates, then discovers.
    pub async fn get_token(&self) -> Result<SecretString, GearshiftError> {
        let (active, generation) = self.snapshot().await;
        if let Some(credential) = active {
            if credential.is_expired_at(Utc::now()) {
                debug!(source = credential.source.as_str(), "active credential expired");
            } else {
                match self.account.probe(&credential.secret).await {
                    Ok(()) => {
                        self.publish(CredentialState::Valid);
                        return Ok(credential.secret);
                    }
                    Err(e) => warn!(
                        source = credential.source.as_str(),
                        error = %e,
                        "active credential failed validation"
                    ),
                }
            }
            self.publish(CredentialState::Stale);
        }
        self.rotate_from(generation).await
    }

    /// Replace the active credential with the first rotation entry that
    /// passes validation, falling back to discovery.
    pub async fn rotate_token(&self) -> Result<SecretString, GearshiftError> {
        let (_, generation) = self.snapshot().await;
        self.rotate_from(generation).await
    }

    /// Install `token` as the active credential and persist it.
    ///
    /// The credential is active even when persisting fails; the error then
    /// reports the persistence failure.
    pub async fn save_token(&self, token: SecretString, source: &str) -> Result<(), GearshiftError> {
        if token.expose_secret().trim().is_empty() {
            return Err(GearshiftError::CredentialInvalid {
                message: "refusing to save an empty token".to_string(),
            });
        }
        let credential = Credential {
            secret: token,
            expires_at: self.expiry_from(Utc::now()),
            source: source.to_string(),
        };

        let mut slot = self.slot.lock().await;
        let persisted = self.persist(&credential).await;
        info!(source, "credential saved");
        slot.active = Some(credential);
        slot.generation += 1;
        drop(slot);

        self.publish(CredentialState::Valid);
        persisted
    }

    /// The active credential, without validating it.
    pub async fn active_credential(&self) -> Option<Credential> {
        self.slot.lock().await.active.clone()
    }

    pub fn state(&self) -> CredentialState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<CredentialState> {
        self.state.subscribe()
    }

    pub fn rotation_file(&self) -> &RotationFile {
        &self.rotation
    }

    /// Start the background refresh task. Returns `false` if one is already
    /// running.
    ///
    /// The task checks the credential immediately, then once per refresh
    /// interval, refreshing any credential that expires within an interval.
    pub fn start_refresh(self: &Arc<Self>) -> bool {
        let mut task = self.refresh.lock().unwrap_or_else(PoisonError::into_inner);
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            debug!("credential refresh already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(refresh_loop(
            Arc::downgrade(self),
            self.refresh_interval,
            cancel.clone(),
        ));
        *task = Some(RefreshTask { cancel, handle });
        info!(
            interval_secs = self.refresh_interval.as_secs(),
            "credential refresh started"
        );
        true
    }

    /// Signal the refresh task to stop without waiting for it. Idempotent.
    pub fn stop_refresh(&self) {
        if let Some(task) = self.take_refresh() {
            task.cancel.cancel();
        }
    }

    /// Stop the refresh task and wait for it to exit.
    pub async fn shutdown(&self) {
        let Some(task) = self.take_refresh() else {
            return;
        };
        task.cancel.cancel();
        if let Err(e) = task.handle.await {
            warn!(error = %e, "credential refresh task ended abnormally");
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    fn take_refresh(&self) -> Option<RefreshTask> {
        self.refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    async fn snapshot(&self) -> (Option<Credential>, u64) {
        let slot = self.slot.lock().await;
        (slot.active.clone(), slot.generation)
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.token_lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn publish(&self, next: CredentialState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!(from = %current, to = %next, "credential state changed");
            *current = next;
            true
        });
    }

    async fn rotate_from(&self, generation: u64) -> Result<SecretString, GearshiftError> {
        self.publish(CredentialState::Rotating);

        let entries = match self.rotation_io(|file| file.load()).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "rotation list unavailable");
                Vec::new()
            }
        };

        for entry in entries {
            if let Err(e) = self.account.probe(&entry.secret).await {
                debug!(source = entry.source.as_str(), error = %e, "rotation entry rejected");
                continue;
            }
            let now = Utc::now();
            let credential = if entry.is_expired_at(now) {
                Credential {
                    expires_at: self.expiry_from(now),
                    ..entry
                }
            } else {
                entry
            };
            info!(source = credential.source.as_str(), "rotated to stored credential");
            metrics::counter!(ROTATIONS_COUNTER, "result" => "rotated").increment(1);
            return Ok(self.install(credential, generation).await);
        }

        self.discover(generation).await
    }

    async fn discover(&self, generation: u64) -> Result<SecretString, GearshiftError> {
        for source in &self.sources {
            let candidates = match tokio::time::timeout(self.io_timeout, source.candidates()).await
            {
                Ok(Ok(candidates)) => candidates,
                Ok(Err(e)) => {
                    debug!(source = source.name(), error = %e, "credential source unavailable");
                    continue;
                }
                Err(_) => {
                    warn!(
                        source = source.name(),
                        timeout = ?self.io_timeout,
                        "credential source timed out"
                    );
                    continue;
                }
            };

            for candidate in candidates {
                if source.requires_probe()
                    && let Err(e) = self.account.probe(&candidate.secret).await
                {
                    debug!(source = candidate.source.as_str(), error = %e, "candidate rejected");
                    continue;
                }
                let credential = Credential {
                    secret: candidate.secret,
                    expires_at: self.expiry_from(Utc::now()),
                    source: candidate.source,
                };
                info!(source = credential.source.as_str(), "discovered credential");
                metrics::counter!(ROTATIONS_COUNTER, "result" => "discovered").increment(1);
                return Ok(self.install(credential, generation).await);
            }
        }

        warn!("credential discovery exhausted every source");
        metrics::counter!(ROTATIONS_COUNTER, "result" => "exhausted").increment(1);
        self.publish(CredentialState::Missing);
        Err(GearshiftError::NoCredential)
    }

    /// Make `credential` active unless a newer one landed since `seen`.
    async fn install(&self, credential: Credential, seen: u64) -> SecretString {
        let mut slot = self.slot.lock().await;
        if slot.generation != seen
            && let Some(newer) = &slot.active
        {
            debug!("keeping credential installed by a concurrent update");
            let secret = copy_secret(&newer.secret);
            drop(slot);
            self.publish(CredentialState::Valid);
            return secret;
        }

        if let Err(e) = self.persist(&credential).await {
            warn!(error = %e, "failed to persist credential");
        }
        let secret = copy_secret(&credential.secret);
        slot.active = Some(credential);
        slot.generation += 1;
        drop(slot);

        self.publish(CredentialState::Valid);
        secret
    }

    /// Write to the secure store (best effort) and the rotation file.
    async fn persist(&self, credential: &Credential) -> Result<(), GearshiftError> {
        if let Some(store) = &self.secure_store
            && credential.source != store.name()
        {
            let write = store.store(credential.secret.expose_secret());
            match tokio::time::timeout(self.io_timeout, write).await {
                Ok(Ok(())) => debug!(store = store.name(), "credential saved to secure store"),
                Ok(Err(e)) => {
                    warn!(store = store.name(), error = %e, "secure store write failed");
                }
                Err(_) => warn!(store = store.name(), "secure store write timed out"),
            }
        }

        let entry = credential.clone();
        self.rotation_io(move |file| file.push(&entry))
            .await
            .map(|_| ())
    }

    async fn rotation_io<T, F>(&self, op: F) -> Result<T, GearshiftError>
    where
        T: Send + 'static,
        F: FnOnce(RotationFile) -> Result<T, GearshiftError> + Send + 'static,
    {
        let file = self.rotation.clone();
        let task = tokio::task::spawn_blocking(move || op(file));
        match tokio::time::timeout(self.io_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(GearshiftError::Internal(format!(
                "rotation file task failed: {e}"
            ))),
            Err(_) => Err(GearshiftError::Timeout {
                duration: self.io_timeout,
            }),
        }
    }

    /// One refresh pass. Never fails; problems are logged and the current
    /// credential stays in place.
    async fn refresh_tick(&self) {
        let (active, generation) = self.snapshot().await;
        let Some(credential) = active else {
            if let Err(e) = self.get_token().await {
                warn!(error = %e, "no credential available during refresh");
            }
            return;
        };

        let remaining = credential.remaining_at(Utc::now());
        if remaining
            .to_std()
            .is_ok_and(|remaining| remaining >= self.refresh_interval)
        {
            debug!(
                remaining_secs = remaining.num_seconds(),
                "credential not due for refresh"
            );
            return;
        }

        info!(
            source = credential.source.as_str(),
            remaining_secs = remaining.num_seconds(),
            "credential near expiry, refreshing"
        );
        match self.account.issue_token(Some(&credential.secret)).await {
            Ok(secret) => {
                let refreshed = Credential {
                    secret,
                    expires_at: self.expiry_from(Utc::now()),
                    source: "refresh".to_string(),
                };
                metrics::counter!(ROTATIONS_COUNTER, "result" => "refreshed").increment(1);
                self.install(refreshed, generation).await;
            }
            Err(e) => {
                warn!(error = %e, "credential refresh failed, trying rotation list");
                if let Err(e) = self.rotate_from(generation).await {
                    warn!(error = %e, "credential refresh exhausted, keeping current credential");
                    self.publish(CredentialState::Stale);
                }
            }
        }
    }
}

impl Drop for CredentialStore {
    fn drop(&mut self) {
        let task = self
            .refresh
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.cancel.cancel();
        }
    }
}

async fn refresh_loop(store: Weak<CredentialStore>, period: Duration, cancel: CancellationToken) {
    if let Some(store) = store.upgrade() {
        tokio::select! {
            result = store.get_token() => {
                if let Err(e) = result {
                    warn!(error = %e, "initial credential check failed");
                }
            }
            _ = cancel.cancelled() => return,
        }
    }

    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let Some(store) = store.upgrade() else {
                    break;
                };
                store.refresh_tick().await;
            }
            _ = cancel.cancelled() => {
                info!("credential refresh shutting down");
                break;
            }
        }
    }
}

#[async_trait]
impl CredentialProvider for CredentialStore {
    async fn current_credential(&self) -> Option<SecretString> {
        let (active, _) = self.snapshot().await;
        match active {
            Some(credential) if !credential.is_expired_at(Utc::now()) => Some(credential.secret),
            _ => self.get_token().await.ok(),
        }
    }

    async fn report_rejected(&self) {
        self.publish(CredentialState::Stale);
        if let Err(e) = self.rotate_token().await {
            warn!(error = %e, "rotation after rejection failed");
        }
    }
}
