// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! At-rest encryption for secure store entries.
//!
//! AES-256-GCM with a key derived from configured secret material via
//! HKDF-SHA256. The storage key name is bound as associated data, so a
//! sealed value only opens under the key it was written to.
//!
//! Sealed format: base64(nonce || ciphertext || tag).

use crate::error::{AuthError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hkdf::Hkdf;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;
use std::sync::Arc;

const HKDF_SALT: &[u8] = b"doubt-session/secure-store";
const HKDF_INFO: &[u8] = b"token-store aes-256-gcm v1";

/// Symmetric cipher for token store values.
#[derive(Clone)]
pub struct TokenCipher {
    key: Arc<LessSafeKey>,
    rng: SystemRandom,
}

impl TokenCipher {
    /// Derive the store key from secret material.
    pub fn from_secret(secret: &[u8]) -> Result<Self> {
        if secret.is_empty() {
            return Err(AuthError::Crypto("store key must not be empty".to_string()));
        }

        let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), secret);
        let mut okm = [0u8; 32];
        hk.expand(HKDF_INFO, &mut okm)
            .map_err(|e| AuthError::Crypto(format!("HKDF expand failed: {}", e)))?;

        let unbound = UnboundKey::new(&AES_256_GCM, &okm)
            .map_err(|_| AuthError::Crypto("invalid AES-256-GCM key".to_string()))?;

        Ok(Self {
            key: Arc::new(LessSafeKey::new(unbound)),
            rng: SystemRandom::new(),
        })
    }

    /// Encrypt plaintext bound to `aad`.
    /// Returns base64-encoded ciphertext.
    pub fn seal(&self, plaintext: &str, aad: &[u8]) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| AuthError::Crypto("random nonce generation failed".to_string()))?;

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::from(aad),
                &mut in_out,
            )
            .map_err(|_| AuthError::Crypto("seal failed".to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&in_out);
        Ok(BASE64.encode(sealed))
    }

    /// Decrypt base64-encoded ciphertext that was sealed with the same `aad`.
    pub fn open(&self, sealed_b64: &str, aad: &[u8]) -> Result<String> {
        let sealed = BASE64
            .decode(sealed_b64.trim())
            .map_err(|e| AuthError::Crypto(format!("Base64 decode failed: {}", e)))?;

        if sealed.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(AuthError::Crypto("sealed value too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| AuthError::Crypto("invalid nonce".to_string()))?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::from(aad), &mut in_out)
            .map_err(|_| AuthError::Crypto("decryption failed".to_string()))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|e| AuthError::Crypto(format!("UTF-8 decode failed: {}", e)))
    }
}
