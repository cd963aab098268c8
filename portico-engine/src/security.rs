//! Session-based security gate.
//!
//! Drives the `Unauthenticated → AccessAuthenticated → ServiceAuthorized`
//! state machine over one session. The upgrade is monotonic within a
//! session's lifetime; only a service-name change resets it.
//!
//! Handshake over the reserved `Chk` endpoint:
//! 1. `Chk/init` with a service-name header issues a fresh access key.
//! 2. Regular requests present the access key to gain `AccessAuthenticated`.
//! 3. `Chk/authorize` with access key + service key escalates the session
//!    and rotates the access key, superseding the pre-escalation token.
//!
//! Access keys are verify-only: the session stores a SHA-256 digest of the
//! issued token, never the plaintext, and comparisons run constant-time.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use portico_core::{
    ApiResponse, Headers, SessionId, HEADER_ACCESS_KEY, HEADER_SERVICE_KEY, HEADER_SERVICE_NAME,
};

use crate::error::{DispatchError, SecurityError};
use crate::session::SessionStore;

/// Session key holding the bound service name.
pub const KEY_SERVICE_NAME: &str = "serviceName";

/// Session key holding the access-key digest.
pub const KEY_ACCESS_KEY: &str = "accessKey";

/// Session key holding the escalation flag.
pub const KEY_SERVICE_AUTHORIZED: &str = "serviceAuthorized";

/// Handshake action issuing the first access key.
pub const ACTION_INIT: &str = "init";

/// Handshake action escalating the session.
pub const ACTION_AUTHORIZE: &str = "authorize";

/// Length of a plaintext access key: 32 lowercase hex characters.
pub const ACCESS_KEY_LEN: usize = 32;

const FLAG_ON: &str = "1";
const FLAG_OFF: &str = "0";

/// Plaintext access key as returned to the caller at issuance.
///
/// Once issued it is never recoverable from the session again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKey(String);

impl AccessKey {
    /// The token string, 32 lowercase hex characters.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Allow-list of known services and their escalation secrets.
#[derive(Debug, Clone, Default)]
pub struct SecurityConfig {
    services: HashMap<String, String>,
}

impl SecurityConfig {
    /// Build the allow-list from `service name → service key` pairs.
    #[must_use]
    pub fn new(services: HashMap<String, String>) -> Self {
        Self { services }
    }

    /// Whether the service name is on the allow-list.
    #[must_use]
    pub fn knows(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    fn service_key(&self, name: &str) -> Option<&str> {
        self.services.get(name).map(String::as_str)
    }
}

/// Per-request view of one session's authentication state.
///
/// Created fresh for every request; the `access_authenticated` flag lives
/// only for the current call, while the service binding and escalation flag
/// persist in the session store.
pub struct SecurityGate {
    config: Arc<SecurityConfig>,
    store: Arc<dyn SessionStore>,
    session: SessionId,
    access_authenticated: bool,
}

impl SecurityGate {
    /// Open a gate over the given session.
    #[must_use]
    pub fn new(config: Arc<SecurityConfig>, store: Arc<dyn SessionStore>, session: SessionId) -> Self {
        Self { config, store, session, access_authenticated: false }
    }

    /// First check on every request: at least one of the access-key or
    /// service-name headers must carry a value. Rejecting here avoids any
    /// routing or session work for garbage traffic.
    ///
    /// # Errors
    /// Returns [`SecurityError::MissingCredentials`] when both are absent
    /// or empty.
    pub fn require_credential_headers(headers: &Headers) -> Result<(), SecurityError> {
        if !headers.has_value(HEADER_ACCESS_KEY) && !headers.has_value(HEADER_SERVICE_NAME) {
            return Err(SecurityError::MissingCredentials);
        }
        Ok(())
    }

    /// First handshake phase: bind a service name to the session and issue
    /// a fresh access key.
    ///
    /// A service-name change (or first binding) resets the escalation flag;
    /// privilege must be re-earned after an identity change. A fresh key is
    /// issued either way.
    ///
    /// # Errors
    /// Returns [`SecurityError::UnknownService`] if the name is not on the
    /// allow-list.
    pub fn init_service(&mut self, service_name: &str) -> Result<AccessKey, SecurityError> {
        if !self.config.knows(service_name) {
            warn!(service = service_name, "init rejected: unknown service");
            return Err(SecurityError::UnknownService { name: service_name.to_owned() });
        }

        let bound = self.store.get(&self.session, KEY_SERVICE_NAME);
        if bound.as_deref() != Some(service_name) {
            self.store.set(&self.session, KEY_SERVICE_NAME, service_name.to_owned());
            self.store.set(&self.session, KEY_SERVICE_AUTHORIZED, FLAG_OFF.to_owned());
            info!(service = service_name, session = %self.session, "service bound to session");
        }

        Ok(self.issue_access_key(service_name))
    }

    /// Verify the presented access key against the session's stored digest.
    ///
    /// A mismatch is not an error: the result is `false` and the caller
    /// decides how to deny. Success marks this request authenticated; the
    /// mark is not persisted.
    ///
    /// # Errors
    /// Returns [`SecurityError::NoServiceBound`] if no service name is
    /// bound to the session yet.
    pub fn authenticate_access(&mut self, access_key: &str) -> Result<bool, SecurityError> {
        if self.store.get(&self.session, KEY_SERVICE_NAME).is_none() {
            return Err(SecurityError::NoServiceBound);
        }

        // Cheap sanity filter before any hashing.
        if access_key.len() != ACCESS_KEY_LEN {
            return Ok(false);
        }

        let Some(stored_digest) = self.store.get(&self.session, KEY_ACCESS_KEY) else {
            return Ok(false);
        };

        let presented_digest = digest(access_key);
        let matched: bool = presented_digest
            .as_bytes()
            .ct_eq(stored_digest.as_bytes())
            .into();

        if matched {
            self.access_authenticated = true;
        }
        Ok(matched)
    }

    /// Second handshake phase: escalate the session with the service key.
    ///
    /// On a matching key the session becomes service-authorized and the
    /// access key is rotated; the returned token supersedes the one used to
    /// make this call. A mismatch yields `None` and leaves the session
    /// state untouched.
    ///
    /// # Errors
    /// Returns [`SecurityError::NotAccessAuthenticated`] if the access key
    /// does not verify, [`SecurityError::EmptyServiceKey`] for a blank
    /// secret, and [`SecurityError::NoServiceBound`] without a bound
    /// service.
    pub fn authorize_service(
        &mut self,
        access_key: &str,
        service_key: &str,
    ) -> Result<Option<AccessKey>, SecurityError> {
        if !self.authenticate_access(access_key)? {
            return Err(SecurityError::NotAccessAuthenticated);
        }

        if service_key.trim().is_empty() {
            return Err(SecurityError::EmptyServiceKey);
        }

        let Some(service_name) = self.store.get(&self.session, KEY_SERVICE_NAME) else {
            return Err(SecurityError::NoServiceBound);
        };
        let Some(expected) = self.config.service_key(&service_name) else {
            return Err(SecurityError::UnknownService { name: service_name });
        };

        let matched: bool = expected.as_bytes().ct_eq(service_key.as_bytes()).into();
        if !matched {
            warn!(service = %service_name, "service key rejected");
            return Ok(None);
        }

        self.store.set(&self.session, KEY_SERVICE_AUTHORIZED, FLAG_ON.to_owned());
        info!(service = %service_name, session = %self.session, "service authorized, rotating access key");
        Ok(Some(self.issue_access_key(&service_name)))
    }

    /// Whether this request may reach privileged action variants: requires
    /// both the in-request authentication mark and the persisted
    /// escalation flag.
    #[must_use]
    pub fn is_service_authorized(&self) -> bool {
        self.access_authenticated
            && self
                .store
                .get(&self.session, KEY_SERVICE_AUTHORIZED)
                .as_deref()
                == Some(FLAG_ON)
    }

    /// Run one handshake action against the reserved security endpoint.
    ///
    /// # Errors
    /// Propagates the underlying [`SecurityError`]s;
    /// [`DispatchError::ServiceKeyRejected`] on an escalation mismatch; and
    /// [`SecurityError::InvalidSecurityAction`] for any action other than
    /// `init` or `authorize`.
    pub fn handshake(&mut self, action: &str, headers: &Headers) -> Result<ApiResponse, DispatchError> {
        match action {
            ACTION_INIT => {
                let Some(service_name) = headers.get(HEADER_SERVICE_NAME).filter(|v| !v.is_empty())
                else {
                    return Err(SecurityError::ServiceNameRequired.into());
                };
                let key = self.init_service(service_name)?;
                Ok(key_envelope(&key))
            }
            ACTION_AUTHORIZE => {
                let access_key = headers.get(HEADER_ACCESS_KEY).filter(|v| !v.is_empty());
                let service_key = headers.get(HEADER_SERVICE_KEY).filter(|v| !v.is_empty());
                let (Some(access_key), Some(service_key)) = (access_key, service_key) else {
                    return Err(SecurityError::AuthorizeKeysRequired.into());
                };
                match self.authorize_service(access_key, service_key)? {
                    Some(key) => Ok(key_envelope(&key)),
                    None => Err(DispatchError::ServiceKeyRejected),
                }
            }
            other => Err(SecurityError::InvalidSecurityAction { action: other.to_owned() }.into()),
        }
    }

    /// Generate a fresh token, persist its digest, and hand back the
    /// plaintext. The stored value cannot be reversed into the token.
    fn issue_access_key(&self, salt: &str) -> AccessKey {
        let token = generate_token(salt);
        self.store.set(&self.session, KEY_ACCESS_KEY, digest(&token));
        AccessKey(token)
    }
}

/// JSON envelope for a successful handshake step.
fn key_envelope(key: &AccessKey) -> ApiResponse {
    ApiResponse::ok_json(serde_json::json!({ "accessKey": key.as_str() }))
}

/// Derive a 32-hex-char token from a timestamp salt, the caller-supplied
/// salt, and 16 bytes of strong randomness.
fn generate_token(salt: &str) -> String {
    let entropy: [u8; 16] = rand::thread_rng().gen();
    let stamp = Utc::now().format("%Y-%m-%d-%H-%M-%S").to_string();

    let mut hasher = Sha256::new();
    hasher.update(stamp.as_bytes());
    hasher.update(salt.as_bytes());
    hasher.update(entropy);

    let mut token = hex::encode(hasher.finalize());
    token.truncate(ACCESS_KEY_LEN);
    token
}

/// One-way digest stored in the session in place of the plaintext token.
fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
