// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Gearshift model router.
//!
//! This crate provides the error taxonomy, domain types, and collaborator
//! traits shared across the Gearshift workspace. Services talk to each other
//! only through the traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::GearshiftError;
pub use types::{
    ClassificationResult, Credential, CredentialState, ModelId, OperationCategory, RouteRequest,
    RoutingDecision, RoutingOutcome, UserState,
};

pub use traits::{
    AccountService, AccountStatus, AccountUsage, CredentialProvider, DecisionSink, SecretStore,
    UserStateSource,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_traits_are_object_safe() {
        fn _account(_: &dyn AccountService) {}
        fn _credentials(_: &dyn CredentialProvider) {}
        fn _secrets(_: &dyn SecretStore) {}
        fn _sink(_: &dyn DecisionSink) {}
        fn _user_state(_: &dyn UserStateSource) {}
    }

    #[test]
    fn error_variants_construct() {
        let _ = GearshiftError::ConfigMalformed {
            message: "bad".into(),
        };
        let _ = GearshiftError::Config("bad".into());
        let _ = GearshiftError::NoCredential;
        let _ = GearshiftError::Timeout {
            duration: std::time::Duration::from_secs(5),
        };
        let _ = GearshiftError::Internal("bad".into());
    }
}
