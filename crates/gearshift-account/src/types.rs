// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account service wire types.

use serde::{Deserialize, Serialize};

use gearshift_core::{AccountStatus, AccountUsage};

/// `GET /user/status` response body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    #[serde(default)]
    pub tier: String,
    #[serde(default)]
    pub accessible_models: Vec<String>,
}

impl From<StatusResponse> for AccountStatus {
    fn from(value: StatusResponse) -> Self {
        AccountStatus {
            tier: value.tier,
            accessible_models: value.accessible_models,
        }
    }
}

/// Fast-request counters inside a usage response.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FastRequests {
    #[serde(default)]
    pub remaining: u64,
}

/// `GET /user/usage` response body.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    #[serde(default)]
    pub fast_requests: FastRequests,
    #[serde(default)]
    pub total_requests: u64,
}

impl From<UsageResponse> for AccountUsage {
    fn from(value: UsageResponse) -> Self {
        AccountUsage {
            fast_requests_remaining: value.fast_requests.remaining,
            total_requests: value.total_requests,
        }
    }
}

/// `POST /auth/token` response body.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Error body some deployments return alongside a failure status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ApiErrorBody {
    pub fn describe(&self) -> Option<&str> {
        self.message.as_deref().or(self.error.as_deref())
    }
}
