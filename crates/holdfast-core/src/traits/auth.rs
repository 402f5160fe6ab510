// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication collaborator.

use std::collections::BTreeMap;

/// Supplies credentials for outbound API calls.
pub trait AuthProvider: Send + Sync + 'static {
    /// Whether credentials are currently available.
    fn is_authenticated(&self) -> bool;

    /// Headers to attach to every outbound request.
    fn auth_headers(&self) -> BTreeMap<String, String>;
}
