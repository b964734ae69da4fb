// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Source of the caller's subscription snapshot.

use async_trait::async_trait;

use crate::types::UserState;

/// Provides the caller's [`UserState`].
///
/// Infallible by contract: implementations fail open to
/// [`UserState::fail_open`] on any upstream problem.
#[async_trait]
pub trait UserStateSource: Send + Sync + 'static {
    async fn user_state(&self) -> UserState;
}
