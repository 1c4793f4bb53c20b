// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PKCE (RFC 7636) verifier/challenge generation, S256 method only.

use crate::error::{AuthError, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};

pub const CHALLENGE_METHOD: &str = "S256";

/// 32 random bytes encode to a 43-character verifier, the RFC minimum.
const VERIFIER_BYTES: usize = 32;

/// A code verifier and its derived challenge.
#[derive(Clone)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

impl PkceChallenge {
    pub fn generate() -> Result<Self> {
        let verifier = random_url_token(VERIFIER_BYTES)?;
        let challenge = challenge_for(&verifier);
        Ok(Self {
            verifier,
            challenge,
        })
    }
}

/// S256 challenge: base64url(sha256(verifier)) without padding.
pub fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Random URL-safe token, also used for the OAuth `state` parameter.
pub fn random_url_token(len: usize) -> Result<String> {
    let mut bytes = vec![0u8; len];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AuthError::Crypto("random generation failed".to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
