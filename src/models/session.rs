// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory authentication state exposed to UI consumers.

use super::{Role, UserProfile};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Session lifecycle state.
///
/// `Loading` is the only state in which navigation must wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/generated/")
)]
pub enum AuthStatus {
    Loading,
    Authenticated { role: Role },
    Unauthenticated,
}

/// Whole-value projection of the stored records. Replaced atomically,
/// never patched field by field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSnapshot {
    pub status: AuthStatus,
    pub user: Option<UserProfile>,
}

impl AuthSnapshot {
    pub fn loading() -> Self {
        Self {
            status: AuthStatus::Loading,
            user: None,
        }
    }

    pub fn unauthenticated() -> Self {
        Self {
            status: AuthStatus::Unauthenticated,
            user: None,
        }
    }

    pub fn authenticated(role: Role, user: Option<UserProfile>) -> Self {
        Self {
            status: AuthStatus::Authenticated { role },
            user,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.status, AuthStatus::Authenticated { .. })
    }

    pub fn is_loading(&self) -> bool {
        self.status == AuthStatus::Loading
    }

    pub fn user_role(&self) -> Option<Role> {
        match self.status {
            AuthStatus::Authenticated { role } => Some(role),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_flags() {
        let snap = AuthSnapshot::authenticated(Role::Expert, None);
        assert!(snap.is_authenticated());
        assert!(!snap.is_loading());
        assert_eq!(snap.user_role(), Some(Role::Expert));

        let snap = AuthSnapshot::loading();
        assert!(snap.is_loading());
        assert_eq!(snap.user_role(), None);
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_value(AuthStatus::Authenticated {
            role: Role::Student,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"status": "authenticated", "role": "student"}));
    }
}
