//! Path resolution under the fixed `[/api]/<endpoint>/<action>` convention.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Marker prepended to every endpoint token to form its registry key.
pub const ENDPOINT_MARKER: &str = "E";

/// Path prefix tolerated (and stripped) when a reverse proxy mounts the API
/// under `/api`.
pub const PROXY_PREFIX: &str = "api";

/// Reserved endpoint token for the security handshake.
pub const SECURITY_ENDPOINT: &str = "Chk";

/// Registry key of the reserved security endpoint.
pub const SECURITY_ENDPOINT_ID: &str = "EChk";

/// Action assumed when the path names no action segment.
pub const DEFAULT_ACTION: &str = "default";

/// A resolved `(endpoint, action)` pair.
///
/// `endpoint_id` is a plain registry key (`E` + capitalized endpoint token),
/// never a type name looked up dynamically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Route {
    /// Registry key of the target endpoint, e.g. `EHello`.
    pub endpoint_id: String,

    /// Action name within the endpoint, e.g. `default`.
    pub action: String,
}

impl Route {
    /// Resolve a raw request path into a `Route`.
    ///
    /// Empty segments are discarded, a single leading `api` segment is
    /// stripped, and the action defaults to [`DEFAULT_ACTION`].
    ///
    /// # Errors
    /// Returns [`CoreError::MalformedPath`] when no endpoint segment remains.
    pub fn resolve(raw_path: &str) -> Result<Self, CoreError> {
        let mut segments = raw_path.split('/').filter(|s| !s.is_empty());

        let first = match segments.next() {
            Some(PROXY_PREFIX) => segments.next(),
            other => other,
        };

        let Some(token) = first else {
            return Err(CoreError::MalformedPath { path: raw_path.to_owned() });
        };

        let action = segments.next().unwrap_or(DEFAULT_ACTION).to_owned();

        Ok(Self {
            endpoint_id: format!("{ENDPOINT_MARKER}{}", capitalize(token)),
            action,
        })
    }

    /// Whether this route targets the reserved security endpoint.
    #[must_use]
    pub fn is_security(&self) -> bool {
        self.endpoint_id == SECURITY_ENDPOINT_ID
    }
}

/// Uppercase the first character of a token, leaving the rest untouched.
///
/// Used for endpoint registry keys (`hello` → `Hello`) and for composing
/// method-qualified action names (`default` → `getDefault`).
#[must_use]
pub fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
