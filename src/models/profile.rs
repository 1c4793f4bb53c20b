// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User profile claims returned by the identity provider.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Arbitrary claims map from the `/userinfo` endpoint (or the ID token).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserProfile(Map<String, Value>);

impl UserProfile {
    pub fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    pub fn claims(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// String-valued claim.
    pub fn str_claim(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Provider subject identifier
    pub fn subject(&self) -> Option<&str> {
        self.str_claim("sub")
    }

    pub fn name(&self) -> Option<&str> {
        self.str_claim("name")
    }

    pub fn email(&self) -> Option<&str> {
        self.str_claim("email")
    }

    pub fn picture(&self) -> Option<&str> {
        self.str_claim("picture")
    }
}

impl From<Map<String, Value>> for UserProfile {
    fn from(claims: Map<String, Value>) -> Self {
        Self(claims)
    }
}
