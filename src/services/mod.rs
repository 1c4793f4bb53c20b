// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - identity and session logic.

pub mod cipher;
pub mod id_token;
pub mod identity;
pub mod pkce;
pub mod session;

pub use cipher::TokenCipher;
pub use identity::{
    AuthorizationCallback, AuthorizationRequest, IdentityClient, IdentityProvider,
};
pub use session::SessionManager;
