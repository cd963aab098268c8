//! Security handshake and dispatch engine for the Portico front controller.
//!
//! Owns the two tightly coupled cores of the system: the session-based
//! security gate (access-key issuance, verification, service-key
//! escalation) and the dispatcher that resolves endpoints from untrusted
//! path input and follows forward instructions under a hop cap.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod registry;
pub mod security;
pub mod session;

pub use dispatcher::{action_preference, Dispatcher, MAX_HOPS, PRIVILEGED_MARKER};
pub use endpoint::{ActionFn, ActionTable, Endpoint};
pub use error::{DispatchError, SecurityError};
pub use registry::{EndpointRegistry, EndpointResolver};
pub use security::{
    AccessKey, SecurityConfig, SecurityGate, ACCESS_KEY_LEN, ACTION_AUTHORIZE, ACTION_INIT,
};
pub use session::{InMemorySessionStore, SessionStore};
