// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Gearshift integration tests.
//!
//! Provides in-process stand-ins for every collaborator trait so routing,
//! caching and credential behavior can be tested without a network, a
//! keychain, or wall-clock waits.
//!
//! # Components
//!
//! - [`MockAccountService`] - Scriptable account service with call counters
//! - [`MemorySecretStore`] - In-memory secret store
//! - [`RecordingSink`] - Decision sink that keeps every routing decision
//! - [`StaticUserState`] - Fixed user state with a call counter
//! - [`StaticCredentials`] - Fixed credential provider that counts rejections

pub mod mock_account;
pub mod mock_collaborators;

pub use mock_account::{MockAccountService, MockFailure};
pub use mock_collaborators::{MemorySecretStore, RecordingSink, StaticCredentials, StaticUserState};
