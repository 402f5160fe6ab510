// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Static credential providers.

use std::collections::BTreeMap;
use std::sync::RwLock;

use holdfast_core::AuthProvider;
use secrecy::{ExposeSecret, SecretString};

/// Bearer-token credentials that can be swapped at runtime (e.g. after a
/// re-login) without rebuilding the queue.
#[derive(Debug, Default)]
pub struct BearerAuth {
    token: RwLock<Option<SecretString>>,
}

impl BearerAuth {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token.map(SecretString::from)),
        }
    }

    /// Replace the token; `None` logs out.
    pub fn set_token(&self, token: Option<String>) {
        let mut guard = self
            .token
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = token.map(SecretString::from);
    }
}

impl AuthProvider for BearerAuth {
    fn is_authenticated(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .is_some()
    }

    fn auth_headers(&self) -> BTreeMap<String, String> {
        let guard = self
            .token
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut headers = BTreeMap::new();
        if let Some(token) = guard.as_ref() {
            headers.insert(
                "authorization".to_string(),
                format!("Bearer {}", token.expose_secret()),
            );
        }
        headers
    }
}

/// For APIs that need no credentials. Always authenticated.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnonymousAuth;

impl AuthProvider for AnonymousAuth {
    fn is_authenticated(&self) -> bool {
        true
    }

    fn auth_headers(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}
