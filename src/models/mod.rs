// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the session layer.

pub mod credential;
pub mod profile;
pub mod role;
pub mod session;

pub use credential::CredentialRecord;
pub use profile::UserProfile;
pub use role::Role;
pub use session::{AuthSnapshot, AuthStatus};
