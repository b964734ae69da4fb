// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the account service.
//!
//! Provides [`AccountClient`], which handles request construction, bearer
//! authentication and the mapping of HTTP status codes onto the error
//! taxonomy. Nothing is retried inline; callers fall back and try again on
//! their next call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;

use gearshift_config::model::AccountConfig;
use gearshift_core::{AccountService, AccountStatus, AccountUsage, GearshiftError};

use crate::types::{ApiErrorBody, StatusResponse, TokenResponse, UsageResponse};

const STATUS_PATH: &str = "/user/status";
const USAGE_PATH: &str = "/user/usage";
const TOKEN_PATH: &str = "/auth/token";

/// HTTP client for account service communication.
#[derive(Debug, Clone)]
pub struct AccountClient {
    client: reqwest::Client,
    base_url: String,
}

impl AccountClient {
    /// Creates a client for the configured account service.
    pub fn new(config: &AccountConfig) -> Result<Self, GearshiftError> {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GearshiftError::UpstreamUnavailable {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(
        request: RequestBuilder,
        credential: Option<&SecretString>,
    ) -> Result<RequestBuilder, GearshiftError> {
        let Some(credential) = credential else {
            return Ok(request);
        };
        let mut value = HeaderValue::from_str(&format!("Bearer {}", credential.expose_secret()))
            .map_err(|_| GearshiftError::CredentialInvalid {
                message: "credential contains characters not allowed in a header".to_string(),
            })?;
        value.set_sensitive(true);
        Ok(request.header(AUTHORIZATION, value))
    }

    /// Sends the request and maps any non-success status onto the taxonomy.
    async fn send(
        &self,
        request: RequestBuilder,
        credential: Option<&SecretString>,
        path: &str,
    ) -> Result<reqwest::Response, GearshiftError> {
        let response = Self::authorize(request, credential)?
            .send()
            .await
            .map_err(|e| GearshiftError::UpstreamUnavailable {
                message: format!("request to {path} failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, path, "account service response received");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, path, &body))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        credential: Option<&SecretString>,
    ) -> Result<T, GearshiftError> {
        let response = self
            .send(self.client.get(self.url(path)), credential, path)
            .await?;
        parse_body(response, path).await
    }
}

/// Map a failure status onto the error taxonomy.
fn status_error(status: StatusCode, path: &str, body: &str) -> GearshiftError {
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.describe().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    let message = if detail.is_empty() {
        format!("{path} returned {status}")
    } else {
        format!("{path} returned {status}: {detail}")
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            GearshiftError::CredentialInvalid { message }
        }
        StatusCode::TOO_MANY_REQUESTS => GearshiftError::QuotaExceeded { message },
        _ => GearshiftError::upstream(message),
    }
}

async fn parse_body<T: DeserializeOwned>(
    response: reqwest::Response,
    path: &str,
) -> Result<T, GearshiftError> {
    let body = response
        .text()
        .await
        .map_err(|e| GearshiftError::UpstreamUnavailable {
            message: format!("failed to read {path} response body: {e}"),
            source: Some(Box::new(e)),
        })?;
    serde_json::from_str(&body).map_err(|e| GearshiftError::UpstreamUnavailable {
        message: format!("failed to parse {path} response: {e}"),
        source: Some(Box::new(e)),
    })
}

#[async_trait]
impl AccountService for AccountClient {
    async fn fetch_status(
        &self,
        credential: Option<&SecretString>,
    ) -> Result<AccountStatus, GearshiftError> {
        let status: StatusResponse = self.get_json(STATUS_PATH, credential).await?;
        Ok(status.into())
    }

    async fn fetch_usage(
        &self,
        credential: Option<&SecretString>,
    ) -> Result<AccountUsage, GearshiftError> {
        let usage: UsageResponse = self.get_json(USAGE_PATH, credential).await?;
        Ok(usage.into())
    }

    async fn probe(&self, credential: &SecretString) -> Result<(), GearshiftError> {
        self.send(
            self.client.get(self.url(STATUS_PATH)),
            Some(credential),
            STATUS_PATH,
        )
        .await
        .map(|_| ())
    }

    async fn issue_token(
        &self,
        credential: Option<&SecretString>,
    ) -> Result<SecretString, GearshiftError> {
        let response = self
            .send(self.client.post(self.url(TOKEN_PATH)), credential, TOKEN_PATH)
            .await?;
        let issued: TokenResponse = parse_body(response, TOKEN_PATH).await?;
        if issued.token.trim().is_empty() {
            return Err(GearshiftError::upstream(format!(
                "{TOKEN_PATH} returned an empty token"
            )));
        }
        Ok(SecretString::from(issued.token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> AccountClient {
        AccountClient::new(&AccountConfig::default())
            .unwrap()
            .with_base_url(base_url.to_string())
    }

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[tokio::test]
    async fn fetch_status_sends_bearer_and_parses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user/status"))
            .and(header("authorization", "Bearer tok-1"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tier": "pro",
                "accessibleModels": ["gemini-2.5-pro", "claude-3.7-sonnet"]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let status = client.fetch_status(Some(&secret("tok-1"))).await.unwrap();
        assert_eq!(status.tier, "pro");
        assert_eq!(status.accessible_models.len(), 2);
    }

    #[tokio::test]
    async fn fetch_usage_without_credential_omits_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user/usage"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user/usage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "fastRequests": {"remaining": 4},
                "totalRequests": 96
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let usage = client.fetch_usage(None).await.unwrap();
        assert_eq!(usage.fast_requests_remaining, 4);
        assert_eq!(usage.total_requests, 96);
    }

    #[tokio::test]
    async fn status_codes_map_to_taxonomy() {
        let server = MockServer::start().await;
        for (code, route) in [(401, "/user/status"), (403, "/user/usage"), (429, "/auth/token")] {
            Mock::given(path(route))
                .respond_with(
                    ResponseTemplate::new(code)
                        .set_body_json(serde_json::json!({"message": "nope"})),
                )
                .mount(&server)
                .await;
        }

        let client = test_client(&server.uri());
        let err = client.fetch_status(Some(&secret("t"))).await.unwrap_err();
        assert!(err.is_credential_invalid(), "got: {err}");
        assert!(err.to_string().contains("nope"));

        let err = client.fetch_usage(Some(&secret("t"))).await.unwrap_err();
        assert!(err.is_credential_invalid(), "got: {err}");

        let err = client.issue_token(None).await.unwrap_err();
        assert!(err.is_quota_signal(), "got: {err}");
    }

    #[tokio::test]
    async fn server_error_and_bad_body_are_upstream() {
        let server = MockServer::start().await;
        Mock::given(path("/user/status"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(path("/user/usage"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert!(matches!(
            client.fetch_status(None).await,
            Err(GearshiftError::UpstreamUnavailable { .. })
        ));
        assert!(matches!(
            client.fetch_usage(None).await,
            Err(GearshiftError::UpstreamUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_server_is_upstream() {
        let client = test_client("http://127.0.0.1:1");
        assert!(matches!(
            client.fetch_status(None).await,
            Err(GearshiftError::UpstreamUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn probe_accepts_only_success() {
        let server = MockServer::start().await;
        Mock::given(path("/user/status"))
            .and(header("authorization", "Bearer good"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;
        Mock::given(path("/user/status"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert!(client.probe(&secret("good")).await.is_ok());
        assert!(client.probe(&secret("bad")).await.unwrap_err().is_credential_invalid());
    }

    #[tokio::test]
    async fn issue_token_posts_and_parses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "new-tok"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let token = client.issue_token(None).await.unwrap();
        assert_eq!(token.expose_secret(), "new-tok");
    }

    #[tokio::test]
    async fn empty_issued_token_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": " "})))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert!(client.issue_token(None).await.is_err());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = AccountConfig {
            base_url: "http://localhost:8080/v1/".to_string(),
            ..AccountConfig::default()
        };
        let client = AccountClient::new(&config).unwrap();
        assert_eq!(client.url(STATUS_PATH), "http://localhost:8080/v1/user/status");
    }
}
