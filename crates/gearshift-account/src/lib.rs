// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account service access for Gearshift.
//!
//! - [`AccountClient`]: reqwest client for the status, usage and token endpoints
//! - [`UserStateCache`]: TTL cache producing the [`UserState`](gearshift_core::UserState)
//!   the router consults, failing open on any upstream error

pub mod cache;
pub mod client;
pub mod types;

pub use cache::UserStateCache;
pub use client::AccountClient;
