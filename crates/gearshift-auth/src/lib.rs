// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential management for Gearshift.
//!
//! [`CredentialStore`] keeps the active access token valid: it probes the
//! active token, rotates through the persisted [`RotationFile`], and falls
//! back to the discovery chain in [`sources`] (secure store, credential
//! files, environment, then a freshly issued token).

pub mod keychain;
pub mod rotation;
pub mod sources;
pub mod store;

pub use keychain::KeyringSecretStore;
pub use rotation::RotationFile;
pub use sources::{
    Candidate, CredentialSource, EnvSource, FileSource, IssuerSource, SecureStoreSource,
    default_sources,
};
pub use store::CredentialStore;
