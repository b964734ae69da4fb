// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gearshift host facade.
//!
//! [`Gearshift`] builds the classifier, latency store, policy table,
//! user-state cache and credential store from one [`GearshiftConfig`] and
//! exposes the handful of operations a code-assistant host calls.

pub mod shutdown;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tokio::sync::watch;
use tracing::info;

use gearshift_account::{AccountClient, UserStateCache};
use gearshift_auth::CredentialStore;
use gearshift_config::GearshiftConfig;
use gearshift_core::{
    AccountService, ClassificationResult, CredentialProvider, CredentialState, DecisionSink,
    GearshiftError, ModelId, RouteRequest, RoutingDecision, UserState, UserStateSource,
};
use gearshift_router::{
    register_metrics, Classify, MetricsStore, ModelRouter, OperationClassifier, PolicyTable,
    TracingDecisionSink,
};

/// Every Gearshift service, wired together.
pub struct Gearshift {
    router: ModelRouter,
    classifier: Arc<OperationClassifier>,
    metrics: Arc<MetricsStore>,
    user_state: Arc<UserStateCache>,
    credentials: Arc<CredentialStore>,
}

impl Gearshift {
    /// Build all services against the configured account service.
    pub fn from_config(config: &GearshiftConfig) -> Result<Self, GearshiftError> {
        let account: Arc<dyn AccountService> = Arc::new(AccountClient::new(&config.account)?);
        let credentials = Arc::new(CredentialStore::new(
            Arc::clone(&account),
            &config.credentials,
        ));
        Ok(Self::with_services(config, account, credentials))
    }

    /// Build around an existing account service and credential store.
    pub fn with_services(
        config: &GearshiftConfig,
        account: Arc<dyn AccountService>,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        let classifier = Arc::new(OperationClassifier::from_config(&config.classifier));
        let metrics = Arc::new(MetricsStore::from_config(&config.metrics));
        let provider: Arc<dyn CredentialProvider> = credentials.clone();
        let user_state = Arc::new(UserStateCache::new(
            account,
            provider,
            &config.account,
            &config.cache,
        ));

        let source: Arc<dyn UserStateSource> = user_state.clone();
        let router = ModelRouter::new(
            config.routing.clone(),
            PolicyTable::from_config(&config.models_or_builtin()),
            Arc::clone(&metrics),
            source,
        )
        .with_classifier(classifier.clone())
        .with_sink(Arc::new(TracingDecisionSink))
        .with_user_state_timeout(Duration::from_secs(config.account.timeout_secs));

        info!(
            models = router.policies().len(),
            rules = classifier.rule_count(),
            routing_enabled = config.routing.enabled,
            "gearshift services ready"
        );

        Self {
            router,
            classifier,
            metrics,
            user_state,
            credentials,
        }
    }

    /// Send routing decisions to `sink` instead of the log.
    pub fn with_sink(mut self, sink: Arc<dyn DecisionSink>) -> Self {
        self.router = self.router.with_sink(sink);
        self
    }

    pub async fn route(&self, request: &RouteRequest) -> ModelId {
        self.router.route(request).await
    }

    pub async fn decide(&self, request: &RouteRequest) -> RoutingDecision {
        self.router.decide(request).await
    }

    pub fn classify(&self, content: &str) -> ClassificationResult {
        self.classifier.classify(content)
    }

    pub async fn get_user_state(&self) -> UserState {
        self.user_state.get_user_state().await
    }

    pub async fn get_token(&self) -> Result<SecretString, GearshiftError> {
        self.credentials.get_token().await
    }

    pub async fn rotate_token(&self) -> Result<SecretString, GearshiftError> {
        self.credentials.rotate_token().await
    }

    pub async fn save_token(&self, token: SecretString, source: &str) -> Result<(), GearshiftError> {
        self.credentials.save_token(token, source).await
    }

    pub fn record_latency(&self, model: &ModelId, ms: u64) {
        self.metrics.record_latency(model, ms);
    }

    /// Mean latency per configured model; models without samples are absent.
    pub fn latencies(&self) -> BTreeMap<ModelId, f64> {
        self.metrics
            .get_latencies(&self.router.policies().model_ids())
            .into_iter()
            .filter(|(_, mean)| mean.is_finite())
            .collect()
    }

    pub fn credential_state(&self) -> CredentialState {
        self.credentials.state()
    }

    pub fn subscribe_credentials(&self) -> watch::Receiver<CredentialState> {
        self.credentials.subscribe()
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    pub fn user_state_cache(&self) -> &Arc<UserStateCache> {
        &self.user_state
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Describe metrics and start the credential refresh task.
    pub fn start(&self) {
        register_metrics();
        self.credentials.start_refresh();
    }

    /// Stop background work and wait for it to finish.
    pub async fn shutdown(&self) {
        self.credentials.shutdown().await;
        info!("gearshift shutdown complete");
    }
}
