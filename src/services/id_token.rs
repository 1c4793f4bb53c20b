// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! ID token claim extraction.
//!
//! The ID token arrives straight from the token endpoint over TLS, so the
//! client only reads its claims. Signature checking belongs to any backend
//! that receives the token from the app.

use crate::error::{AuthError, Result};
use crate::models::UserProfile;
use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};
use serde_json::{Map, Value};

/// Decode the claims of an ID token without verifying its signature.
pub fn decode_claims_unverified(id_token: &str) -> Result<UserProfile> {
    let header = decode_header(id_token)
        .map_err(|e| AuthError::InvalidResponse(format!("Malformed ID token header: {}", e)))?;

    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<Map<String, Value>>(id_token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| AuthError::InvalidResponse(format!("Malformed ID token: {}", e)))?;

    Ok(UserProfile::new(data.claims))
}
