// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock account service for deterministic testing.
//!
//! `MockAccountService` implements `AccountService` with scripted replies.
//! Tokens handed out by `issue_token` are popped from a FIFO queue and
//! become valid for `probe` immediately.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;

use gearshift_core::{AccountService, AccountStatus, AccountUsage, GearshiftError};

/// Failure mode applied to every call until cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Transport or 5xx failure.
    Unavailable,
    /// 401/403.
    Rejected,
    /// 429.
    Quota,
}

impl MockFailure {
    fn to_error(self) -> GearshiftError {
        match self {
            MockFailure::Unavailable => GearshiftError::upstream("mock account service unavailable"),
            MockFailure::Rejected => GearshiftError::CredentialInvalid {
                message: "mock rejected credential".to_string(),
            },
            MockFailure::Quota => GearshiftError::QuotaExceeded {
                message: "mock quota exceeded".to_string(),
            },
        }
    }
}

/// A scriptable account service.
pub struct MockAccountService {
    status: Mutex<AccountStatus>,
    usage: Mutex<AccountUsage>,
    failure: Mutex<Option<MockFailure>>,
    valid_tokens: Mutex<HashSet<String>>,
    issue_queue: Mutex<VecDeque<String>>,
    delay: Mutex<Option<Duration>>,
    last_credential: Mutex<Option<String>>,
    status_calls: AtomicUsize,
    usage_calls: AtomicUsize,
    probe_calls: AtomicUsize,
    issue_calls: AtomicUsize,
}

impl MockAccountService {
    /// A service reporting a free tier with no quota and no valid tokens.
    pub fn new() -> Self {
        Self {
            status: Mutex::new(AccountStatus {
                tier: "free".to_string(),
                accessible_models: Vec::new(),
            }),
            usage: Mutex::new(AccountUsage::default()),
            failure: Mutex::new(None),
            valid_tokens: Mutex::new(HashSet::new()),
            issue_queue: Mutex::new(VecDeque::new()),
            delay: Mutex::new(None),
            last_credential: Mutex::new(None),
            status_calls: AtomicUsize::new(0),
            usage_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
            issue_calls: AtomicUsize::new(0),
        }
    }

    /// A service reporting the given tier and remaining fast quota.
    pub fn with_tier(tier: &str, fast_remaining: u64) -> Self {
        Self {
            status: Mutex::new(AccountStatus {
                tier: tier.to_string(),
                accessible_models: Vec::new(),
            }),
            usage: Mutex::new(AccountUsage {
                fast_requests_remaining: fast_remaining,
                total_requests: 0,
            }),
            ..Self::new()
        }
    }

    pub async fn set_status(&self, status: AccountStatus) {
        *self.status.lock().await = status;
    }

    pub async fn set_usage(&self, usage: AccountUsage) {
        *self.usage.lock().await = usage;
    }

    /// Fail every call with `failure` until [`recover`](Self::recover).
    pub async fn fail_with(&self, failure: MockFailure) {
        *self.failure.lock().await = Some(failure);
    }

    pub async fn recover(&self) {
        *self.failure.lock().await = None;
    }

    /// Mark a token as passing `probe`.
    pub async fn accept_token(&self, token: &str) {
        self.valid_tokens.lock().await.insert(token.to_string());
    }

    pub async fn revoke_token(&self, token: &str) {
        self.valid_tokens.lock().await.remove(token);
    }

    /// Queue a token for the next `issue_token` call.
    pub async fn queue_issued_token(&self, token: &str) {
        self.issue_queue.lock().await.push_back(token.to_string());
    }

    /// Delay status and usage replies, for coalescing tests.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.lock().await = Some(delay);
    }

    /// The credential presented on the most recent status or usage call.
    pub async fn last_credential(&self) -> Option<String> {
        self.last_credential.lock().await.clone()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn usage_calls(&self) -> usize {
        self.usage_calls.load(Ordering::SeqCst)
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn issue_calls(&self) -> usize {
        self.issue_calls.load(Ordering::SeqCst)
    }

    async fn before_read(&self, credential: Option<&SecretString>) -> Result<(), GearshiftError> {
        *self.last_credential.lock().await = credential.map(|c| c.expose_secret().to_string());
        let delay = *self.delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match *self.failure.lock().await {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }
}

impl Default for MockAccountService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountService for MockAccountService {
    async fn fetch_status(
        &self,
        credential: Option<&SecretString>,
    ) -> Result<AccountStatus, GearshiftError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.before_read(credential).await?;
        Ok(self.status.lock().await.clone())
    }

    async fn fetch_usage(
        &self,
        credential: Option<&SecretString>,
    ) -> Result<AccountUsage, GearshiftError> {
        self.usage_calls.fetch_add(1, Ordering::SeqCst);
        self.before_read(credential).await?;
        Ok(*self.usage.lock().await)
    }

    async fn probe(&self, credential: &SecretString) -> Result<(), GearshiftError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = *self.failure.lock().await {
            return Err(failure.to_error());
        }
        if self
            .valid_tokens
            .lock()
            .await
            .contains(credential.expose_secret())
        {
            Ok(())
        } else {
            Err(GearshiftError::CredentialInvalid {
                message: "mock probe rejected token".to_string(),
            })
        }
    }

    async fn issue_token(
        &self,
        _credential: Option<&SecretString>,
    ) -> Result<SecretString, GearshiftError> {
        self.issue_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = *self.failure.lock().await {
            return Err(failure.to_error());
        }
        let token = self
            .issue_queue
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| GearshiftError::upstream("mock has no token to issue"))?;
        self.valid_tokens.lock().await.insert(token.clone());
        Ok(SecretString::from(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issued_tokens_pass_probe() {
        let mock = MockAccountService::new();
        mock.queue_issued_token("fresh").await;

        let token = mock.issue_token(None).await.unwrap();
        assert_eq!(token.expose_secret(), "fresh");
        assert!(mock.probe(&token).await.is_ok());
        assert!(mock.issue_token(None).await.is_err());
        assert_eq!(mock.issue_calls(), 2);
    }

    #[tokio::test]
    async fn failure_applies_until_recovered() {
        let mock = MockAccountService::with_tier("pro", 3);
        mock.fail_with(MockFailure::Quota).await;
        assert!(mock.fetch_usage(None).await.unwrap_err().is_quota_signal());

        mock.recover().await;
        assert_eq!(mock.fetch_usage(None).await.unwrap().fast_requests_remaining, 3);
        assert_eq!(mock.fetch_status(None).await.unwrap().tier, "pro");
    }
}
