// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits at the seams between Gearshift services.
//!
//! Services depend on these traits rather than on each other, so the host
//! wires concrete implementations explicitly and tests inject mocks.

pub mod account;
pub mod credentials;
pub mod secret_store;
pub mod telemetry;
pub mod user_state;

pub use account::{AccountService, AccountStatus, AccountUsage};
pub use credentials::CredentialProvider;
pub use secret_store::SecretStore;
pub use telemetry::DecisionSink;
pub use user_state::UserStateSource;
