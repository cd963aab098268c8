//! Error types for the engine crate.

use portico_core::CoreError;

/// Failures of the authentication/authorization state machine.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SecurityError {
    /// Neither credential header carried a value.
    #[error("invalid combination of headers: need x-access-key or x-service-name")]
    MissingCredentials,

    /// The claimed service is not on the configured allow-list.
    #[error("unknown service '{name}'")]
    UnknownService { name: String },

    /// The session has no service name bound yet.
    #[error("no service name bound to session")]
    NoServiceBound,

    /// Escalation was attempted without a valid access key.
    #[error("not authenticated by access key")]
    NotAccessAuthenticated,

    /// The escalation secret was blank.
    #[error("empty service key")]
    EmptyServiceKey,

    /// `init` was called without a service name to bind.
    #[error("cannot identify service: no service name supplied")]
    ServiceNameRequired,

    /// `authorize` was called without both required keys.
    #[error("cannot authorize without access key and service key")]
    AuthorizeKeysRequired,

    /// The reserved security endpoint was addressed with an unknown action.
    #[error("invalid security action '{action}'")]
    InvalidSecurityAction { action: String },
}

/// Failures of one `process_request` cycle.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DispatchError {
    /// A security precondition or handshake step failed.
    #[error(transparent)]
    Security(#[from] SecurityError),

    /// The request path could not be resolved into a route.
    #[error(transparent)]
    Path(#[from] CoreError),

    /// The access key did not match the session's stored key.
    #[error("request not authenticated")]
    NotAuthenticated,

    /// The service key did not match the configured secret.
    #[error("service authorization failed")]
    ServiceKeyRejected,

    /// No handler is registered under the resolved endpoint key.
    #[error("no endpoint registered for '{endpoint_id}'")]
    EndpointNotFound { endpoint_id: String },

    /// The endpoint exposes no matching action variant.
    #[error("no action '{action}' on endpoint '{endpoint_id}'")]
    ActionNotFound { endpoint_id: String, action: String },

    /// The forward chain exceeded the hop cap. Fatal, never retried.
    #[error("too many forwards: loop detected after {hops} hops")]
    ForwardLoop { hops: usize },

    /// A first-hop failure downgraded to a generic client error,
    /// message preserved, detail suppressed.
    #[error("bad request: {message}")]
    BadRequest { message: String },

    /// A handler reported a failure of its own.
    #[error("handler failed: {message}")]
    Handler { message: String },
}
