//! The immutable per-call request value and its credential headers.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Header claiming the caller's service identity.
pub const HEADER_SERVICE_NAME: &str = "x-service-name";

/// Header carrying the privilege-escalation secret.
pub const HEADER_SERVICE_KEY: &str = "x-service-key";

/// Header carrying the session-bound continuity token.
pub const HEADER_ACCESS_KEY: &str = "x-access-key";

/// Opaque identifier for a client session.
///
/// Distinct from every credential header; the transport carries it
/// separately (Portico's gateway uses the `x-session-id` header).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Creates a new random `SessionId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SessionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Authentication level derived for one request.
///
/// Ordered: `ServiceAuthorized` implies `AccessAuthenticated`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AuthState {
    /// No valid access key presented.
    #[default]
    Unauthenticated,
    /// Access key matched the session's stored key.
    AccessAuthenticated,
    /// Additionally passed service-key escalation.
    ServiceAuthorized,
}

/// Case-insensitive header map. Names are stored lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers {
    map: HashMap<String, String>,
}

impl Headers {
    /// Creates an empty header map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, replacing any previous value for the same name.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.map.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Look up a header by name, case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Whether the header is present with a non-empty value.
    #[must_use]
    pub fn has_value(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| !v.is_empty())
    }
}

impl<N: AsRef<str>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name.as_ref(), value);
        }
        headers
    }
}

/// Metadata of one uploaded file. The payload itself stays at the transport
/// boundary; the core only routes on metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct FileUpload {
    /// Client-supplied file name.
    pub name: String,
    /// Declared media type, if any.
    pub content_type: Option<String>,
    /// Payload size in bytes.
    pub size: u64,
}

impl FileUpload {
    /// Describe one received upload.
    #[must_use]
    pub fn new(name: impl Into<String>, content_type: Option<String>, size: u64) -> Self {
        Self { name: name.into(), content_type, size }
    }
}

/// One request flowing through the dispatch loop, initial or forwarded.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ApiRequest {
    /// Session the request belongs to.
    pub session: SessionId,
    /// HTTP method, as received from the transport.
    pub method: String,
    /// Raw request path, resolved per hop.
    pub path: String,
    /// POST-equivalent body fields.
    pub post: Map<String, Value>,
    /// Uploaded-file metadata.
    pub files: Vec<FileUpload>,
    /// Request headers, lowercased names.
    pub headers: Headers,
    /// Authentication level stamped by the dispatcher before invocation.
    pub auth: AuthState,
}

impl ApiRequest {
    /// Creates a bare request with empty body, files, and headers.
    pub fn new(session: SessionId, method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            session,
            method: method.into(),
            path: path.into(),
            post: Map::new(),
            files: Vec::new(),
            headers: Headers::new(),
            auth: AuthState::Unauthenticated,
        }
    }

    /// Derive the forward target for re-dispatch: same session, credentials,
    /// and body, new path.
    #[must_use]
    pub fn forward_to(&self, path: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.path = path.into();
        next
    }

    /// Value of the access-key credential header, if present.
    #[must_use]
    pub fn access_key(&self) -> Option<&str> {
        self.headers.get(HEADER_ACCESS_KEY)
    }

    /// Value of the service-name credential header, if present.
    #[must_use]
    pub fn service_name(&self) -> Option<&str> {
        self.headers.get(HEADER_SERVICE_NAME)
    }

    /// Value of the service-key credential header, if present.
    #[must_use]
    pub fn service_key(&self) -> Option<&str> {
        self.headers.get(HEADER_SERVICE_KEY)
    }

    /// A POST body field by key.
    #[must_use]
    pub fn post_value(&self, key: &str) -> Option<&Value> {
        self.post.get(key)
    }
}
