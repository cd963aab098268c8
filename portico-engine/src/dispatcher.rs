//! The request-to-response cycle: security precondition, endpoint
//! resolution, handler invocation, and the bounded forward loop.

use std::sync::Arc;

use tracing::{debug, warn};

use portico_core::route::capitalize;
use portico_core::{ApiRequest, ApiResponse, AuthState, Route};

use crate::error::DispatchError;
use crate::registry::EndpointResolver;
use crate::security::{SecurityConfig, SecurityGate};
use crate::session::SessionStore;

/// Maximum number of hops (initial + forwarded) in one top-level call.
pub const MAX_HOPS: usize = 20;

/// Name prefix of action variants reachable only when service-authorized.
pub const PRIVILEGED_MARKER: &str = "__";

/// Front controller for one request-to-response cycle.
///
/// Holds only shared collaborators; all per-request state (the security
/// gate, the dispatch trace) is created inside `process_request` and
/// discarded at the end.
pub struct Dispatcher {
    config: Arc<SecurityConfig>,
    store: Arc<dyn SessionStore>,
    registry: Arc<dyn EndpointResolver>,
    max_hops: usize,
}

impl Dispatcher {
    /// Create a dispatcher with the default hop cap of [`MAX_HOPS`].
    #[must_use]
    pub fn new(
        config: Arc<SecurityConfig>,
        store: Arc<dyn SessionStore>,
        registry: Arc<dyn EndpointResolver>,
    ) -> Self {
        Self::with_max_hops(config, store, registry, MAX_HOPS)
    }

    /// Create a dispatcher with a custom hop cap.
    #[must_use]
    pub fn with_max_hops(
        config: Arc<SecurityConfig>,
        store: Arc<dyn SessionStore>,
        registry: Arc<dyn EndpointResolver>,
        max_hops: usize,
    ) -> Self {
        Self { config, store, registry, max_hops }
    }

    /// Run one full cycle: credential precheck, handshake interception,
    /// access authentication, then the forward-following dispatch loop.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Security`] for precondition and handshake
    ///   failures, before any routing work;
    /// - [`DispatchError::NotAuthenticated`] when the access key does not
    ///   verify against the session;
    /// - [`DispatchError::EndpointNotFound`] / [`DispatchError::ActionNotFound`]
    ///   for routing misses;
    /// - [`DispatchError::ForwardLoop`] once the trace exceeds the hop cap;
    /// - handler failures on the first hop come back as
    ///   [`DispatchError::BadRequest`], on forwarded hops unwrapped.
    pub fn process_request(&self, request: ApiRequest) -> Result<ApiResponse, DispatchError> {
        // Reject before any routing or session work.
        SecurityGate::require_credential_headers(&request.headers)?;

        let mut gate = SecurityGate::new(
            Arc::clone(&self.config),
            Arc::clone(&self.store),
            request.session,
        );

        let route = Route::resolve(&request.path)?;
        if route.is_security() {
            debug!(action = %route.action, session = %request.session, "handshake intercepted");
            return gate.handshake(&route.action, &request.headers);
        }

        let access_key = request.access_key().unwrap_or("");
        if !gate.authenticate_access(access_key)? {
            warn!(session = %request.session, path = %request.path, "access key rejected");
            return Err(DispatchError::NotAuthenticated);
        }

        self.dispatch_loop(gate, request, route)
    }

    /// Bounded iteration over forward instructions. One hop = one endpoint
    /// invocation.
    fn dispatch_loop(
        &self,
        gate: SecurityGate,
        request: ApiRequest,
        route: Route,
    ) -> Result<ApiResponse, DispatchError> {
        let mut trace: Vec<ApiRequest> = Vec::new();
        let mut request = request;
        let mut route = route;

        loop {
            trace.push(request.clone());
            if trace.len() > self.max_hops {
                return Err(DispatchError::ForwardLoop { hops: self.max_hops });
            }

            let Some(endpoint) = self.registry.endpoint(&route.endpoint_id) else {
                return Err(DispatchError::EndpointNotFound { endpoint_id: route.endpoint_id });
            };

            let privileged = gate.is_service_authorized();
            request.auth = if privileged {
                AuthState::ServiceAuthorized
            } else {
                AuthState::AccessAuthenticated
            };

            let variants = action_preference(&request.method, &route.action, privileged);
            let Some(handler) = variants.iter().find_map(|name| endpoint.actions().get(name))
            else {
                return Err(DispatchError::ActionNotFound {
                    endpoint_id: route.endpoint_id,
                    action: route.action,
                });
            };

            match handler(&request) {
                Ok(portico_core::Dispatch::Terminal(response)) => return Ok(response),
                Ok(portico_core::Dispatch::Forward(next)) => {
                    debug!(from = %request.path, to = %next.path, hop = trace.len(), "forwarding");
                    route = Route::resolve(&next.path)?;
                    request = next;
                }
                // A forward implies the first hop already succeeded, so
                // deeper failures keep their full context.
                Err(e) if trace.len() > 1 => return Err(e),
                Err(e) => return Err(DispatchError::BadRequest { message: e.to_string() }),
            }
        }
    }
}

/// Ordered action-name variants to probe against the capability table.
///
/// Privileged-prefixed variants come first and only when the caller is
/// service-authorized; the method-qualified form always precedes the bare
/// action name.
#[must_use]
pub fn action_preference(method: &str, action: &str, privileged: bool) -> Vec<String> {
    let qualified = format!("{}{}", method.to_ascii_lowercase(), capitalize(action));

    let mut variants = Vec::with_capacity(4);
    if privileged {
        variants.push(format!("{PRIVILEGED_MARKER}{qualified}"));
        variants.push(format!("{PRIVILEGED_MARKER}{action}"));
    }
    variants.push(qualified);
    variants.push(action.to_owned());
    variants
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::endpoint::{ActionTable, Endpoint};
    use crate::registry::EndpointRegistry;
    use crate::session::InMemorySessionStore;
    use portico_core::{Dispatch, ResponseBody, SessionId, HEADER_ACCESS_KEY, HEADER_SERVICE_NAME};

    struct TableEndpoint {
        table: ActionTable,
    }

    impl Endpoint for TableEndpoint {
        fn actions(&self) -> &ActionTable {
            &self.table
        }
    }

    fn endpoint(table: ActionTable) -> Arc<dyn Endpoint> {
        Arc::new(TableEndpoint { table })
    }

    fn named_terminal(tag: &'static str) -> ActionTable {
        ActionTable::new().on(tag, move |_req| {
            Ok(Dispatch::ok_json(serde_json::json!({ "ran": tag })))
        })
    }

    struct Fixture {
        store: Arc<InMemorySessionStore>,
        config: Arc<SecurityConfig>,
        session: SessionId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut services = std::collections::HashMap::new();
            services.insert("billing".to_owned(), "s3cr3t-billing".to_owned());
            Self {
                store: Arc::new(InMemorySessionStore::new()),
                config: Arc::new(SecurityConfig::new(services)),
                session: SessionId::new(),
            }
        }

        fn dispatcher(&self, registry: EndpointRegistry) -> Dispatcher {
            Dispatcher::new(
                Arc::clone(&self.config),
                Arc::clone(&self.store) as Arc<dyn SessionStore>,
                Arc::new(registry),
            )
        }

        /// Run the init handshake and return the issued plaintext key.
        fn issue_key(&self) -> String {
            let mut gate = SecurityGate::new(
                Arc::clone(&self.config),
                Arc::clone(&self.store) as Arc<dyn SessionStore>,
                self.session,
            );
            match gate.init_service("billing") {
                Ok(key) => key.as_str().to_owned(),
                Err(e) => panic!("fixture init failed: {e}"),
            }
        }

        /// Escalate the session and return the rotated key.
        fn escalate(&self) -> String {
            let key = self.issue_key();
            let mut gate = SecurityGate::new(
                Arc::clone(&self.config),
                Arc::clone(&self.store) as Arc<dyn SessionStore>,
                self.session,
            );
            match gate.authorize_service(&key, "s3cr3t-billing") {
                Ok(Some(rotated)) => rotated.as_str().to_owned(),
                other => panic!("fixture escalation failed: {other:?}"),
            }
        }

        fn request(&self, method: &str, path: &str, access_key: &str) -> ApiRequest {
            let mut request = ApiRequest::new(self.session, method, path);
            request.headers.insert(HEADER_SERVICE_NAME, "billing");
            request.headers.insert(HEADER_ACCESS_KEY, access_key);
            request
        }
    }

    fn ran_tag(response: &ApiResponse) -> String {
        let ResponseBody::Json(body) = &response.body else {
            panic!("expected JSON body, got {:?}", response.body);
        };
        match body["ran"].as_str() {
            Some(tag) => tag.to_owned(),
            None => panic!("body missing 'ran' tag: {body}"),
        }
    }

    #[test]
    fn terminal_response_is_delivered() {
        let fixture = Fixture::new();
        let key = fixture.issue_key();
        let mut registry = EndpointRegistry::new();
        registry.register("EHello", endpoint(named_terminal("default")));

        let dispatcher = fixture.dispatcher(registry);
        let response = match dispatcher.process_request(fixture.request("GET", "/hello", &key)) {
            Ok(r) => r,
            Err(e) => panic!("dispatch failed: {e}"),
        };
        assert_eq!(response.status, 200);
        assert_eq!(ran_tag(&response), "default");
    }

    #[test]
    fn missing_credentials_short_circuits_before_lookup() {
        struct CountingResolver {
            lookups: AtomicUsize,
        }
        impl EndpointResolver for CountingResolver {
            fn endpoint(&self, _endpoint_id: &str) -> Option<Arc<dyn Endpoint>> {
                self.lookups.fetch_add(1, Ordering::SeqCst);
                None
            }
        }

        let fixture = Fixture::new();
        let resolver = Arc::new(CountingResolver { lookups: AtomicUsize::new(0) });
        let dispatcher = Dispatcher::new(
            Arc::clone(&fixture.config),
            Arc::clone(&fixture.store) as Arc<dyn SessionStore>,
            Arc::clone(&resolver) as Arc<dyn EndpointResolver>,
        );

        let request = ApiRequest::new(fixture.session, "GET", "/hello");
        let result = dispatcher.process_request(request);
        assert!(matches!(
            result,
            Err(DispatchError::Security(crate::error::SecurityError::MissingCredentials))
        ));
        assert_eq!(
            resolver.lookups.load(Ordering::SeqCst),
            0,
            "registry must never be consulted for credential-less requests"
        );
    }

    #[test]
    fn wrong_access_key_is_denied() {
        let fixture = Fixture::new();
        fixture.issue_key();
        let mut registry = EndpointRegistry::new();
        registry.register("EHello", endpoint(named_terminal("default")));

        let dispatcher = fixture.dispatcher(registry);
        let result = dispatcher.process_request(fixture.request("GET", "/hello", &"f".repeat(32)));
        assert!(matches!(result, Err(DispatchError::NotAuthenticated)));
    }

    #[test]
    fn unknown_endpoint_maps_to_not_found() {
        let fixture = Fixture::new();
        let key = fixture.issue_key();
        let dispatcher = fixture.dispatcher(EndpointRegistry::new());
        let result = dispatcher.process_request(fixture.request("GET", "/ghost", &key));
        assert!(matches!(result, Err(DispatchError::EndpointNotFound { .. })));
    }

    #[test]
    fn unknown_action_maps_to_not_found() {
        let fixture = Fixture::new();
        let key = fixture.issue_key();
        let mut registry = EndpointRegistry::new();
        registry.register("EHello", endpoint(named_terminal("default")));

        let dispatcher = fixture.dispatcher(registry);
        let result = dispatcher.process_request(fixture.request("GET", "/hello/ghost", &key));
        assert!(matches!(result, Err(DispatchError::ActionNotFound { .. })));
    }

    #[test]
    fn method_qualified_variant_wins_over_bare_action() {
        let fixture = Fixture::new();
        let key = fixture.issue_key();
        let table = named_terminal("default").on("getDefault", |_req| {
            Ok(Dispatch::ok_json(serde_json::json!({ "ran": "getDefault" })))
        });
        let mut registry = EndpointRegistry::new();
        registry.register("EHello", endpoint(table));

        let dispatcher = fixture.dispatcher(registry);
        let response = match dispatcher.process_request(fixture.request("GET", "/hello", &key)) {
            Ok(r) => r,
            Err(e) => panic!("dispatch failed: {e}"),
        };
        assert_eq!(ran_tag(&response), "getDefault");
    }

    #[test]
    fn privileged_variants_skipped_without_escalation() {
        let fixture = Fixture::new();
        let key = fixture.issue_key();
        let table = named_terminal("default").on("__default", |_req| {
            Ok(Dispatch::ok_json(serde_json::json!({ "ran": "__default" })))
        });
        let mut registry = EndpointRegistry::new();
        registry.register("EHello", endpoint(table));

        let dispatcher = fixture.dispatcher(registry);
        let response = match dispatcher.process_request(fixture.request("GET", "/hello", &key)) {
            Ok(r) => r,
            Err(e) => panic!("dispatch failed: {e}"),
        };
        assert_eq!(ran_tag(&response), "default", "unescalated callers reach public variants only");
    }

    #[test]
    fn privileged_variant_wins_after_escalation() {
        let fixture = Fixture::new();
        let key = fixture.escalate();
        let table = named_terminal("default").on("__default", |_req| {
            Ok(Dispatch::ok_json(serde_json::json!({ "ran": "__default" })))
        });
        let mut registry = EndpointRegistry::new();
        registry.register("EHello", endpoint(table));

        let dispatcher = fixture.dispatcher(registry);
        let response = match dispatcher.process_request(fixture.request("GET", "/hello", &key)) {
            Ok(r) => r,
            Err(e) => panic!("dispatch failed: {e}"),
        };
        assert_eq!(ran_tag(&response), "__default");
    }

    #[test]
    fn forward_reaches_the_target_action() {
        let fixture = Fixture::new();
        let key = fixture.issue_key();
        let table = named_terminal("default")
            .on("legacy", |req: &ApiRequest| Ok(Dispatch::forward(req, "/hello/default")));
        let mut registry = EndpointRegistry::new();
        registry.register("EHello", endpoint(table));

        let dispatcher = fixture.dispatcher(registry);
        let response =
            match dispatcher.process_request(fixture.request("GET", "/hello/legacy", &key)) {
                Ok(r) => r,
                Err(e) => panic!("dispatch failed: {e}"),
            };
        assert_eq!(ran_tag(&response), "default");
    }

    #[test]
    fn forward_cycle_fails_at_the_hop_cap() {
        let fixture = Fixture::new();
        let key = fixture.issue_key();
        let invocations = Arc::new(AtomicUsize::new(0));

        let ping_count = Arc::clone(&invocations);
        let ping = ActionTable::new().on("default", move |req: &ApiRequest| {
            ping_count.fetch_add(1, Ordering::SeqCst);
            Ok(Dispatch::forward(req, "/pong"))
        });
        let pong_count = Arc::clone(&invocations);
        let pong = ActionTable::new().on("default", move |req: &ApiRequest| {
            pong_count.fetch_add(1, Ordering::SeqCst);
            Ok(Dispatch::forward(req, "/ping"))
        });

        let mut registry = EndpointRegistry::new();
        registry.register("EPing", endpoint(ping));
        registry.register("EPong", endpoint(pong));

        let dispatcher = fixture.dispatcher(registry);
        let result = dispatcher.process_request(fixture.request("GET", "/ping", &key));
        assert!(matches!(result, Err(DispatchError::ForwardLoop { hops: MAX_HOPS })));
        assert_eq!(
            invocations.load(Ordering::SeqCst),
            MAX_HOPS,
            "the hop that would exceed the cap must not be invoked"
        );
    }

    #[test]
    fn first_hop_handler_failure_is_downgraded() {
        let fixture = Fixture::new();
        let key = fixture.issue_key();
        let table = ActionTable::new().on("default", |_req| {
            Err(DispatchError::Handler { message: "backend unavailable".to_owned() })
        });
        let mut registry = EndpointRegistry::new();
        registry.register("EHello", endpoint(table));

        let dispatcher = fixture.dispatcher(registry);
        let result = dispatcher.process_request(fixture.request("GET", "/hello", &key));
        match result {
            Err(DispatchError::BadRequest { message }) => {
                assert!(message.contains("backend unavailable"), "message must be preserved");
            }
            other => panic!("first-hop failures must downgrade to BadRequest, got {other:?}"),
        }
    }

    #[test]
    fn forwarded_hop_failure_propagates_unwrapped() {
        let fixture = Fixture::new();
        let key = fixture.issue_key();
        let hello = ActionTable::new()
            .on("default", |req: &ApiRequest| Ok(Dispatch::forward(req, "/broken")));
        let broken = ActionTable::new().on("default", |_req| {
            Err(DispatchError::Handler { message: "backend unavailable".to_owned() })
        });

        let mut registry = EndpointRegistry::new();
        registry.register("EHello", endpoint(hello));
        registry.register("EBroken", endpoint(broken));

        let dispatcher = fixture.dispatcher(registry);
        let result = dispatcher.process_request(fixture.request("GET", "/hello", &key));
        assert!(
            matches!(result, Err(DispatchError::Handler { .. })),
            "forwarded-hop failures keep their class"
        );
    }

    #[test]
    fn handshake_intercepted_before_authentication() {
        let fixture = Fixture::new();
        let mut registry = EndpointRegistry::new();
        registry.register("EHello", endpoint(named_terminal("default")));
        let dispatcher = fixture.dispatcher(registry);

        // No access key exists yet; only the handshake path is reachable.
        let mut request = ApiRequest::new(fixture.session, "GET", "/api/Chk/init");
        request.headers.insert(HEADER_SERVICE_NAME, "billing");
        let response = match dispatcher.process_request(request) {
            Ok(r) => r,
            Err(e) => panic!("init must be reachable without a key: {e}"),
        };
        assert_eq!(response.status, 200);
    }

    #[test]
    fn action_preference_order_matches_contract() {
        assert_eq!(
            action_preference("GET", "detail", true),
            vec!["__getDetail", "__detail", "getDetail", "detail"]
        );
        assert_eq!(action_preference("POST", "detail", false), vec!["postDetail", "detail"]);
    }

    #[test]
    fn custom_hop_cap_is_honored() {
        let fixture = Fixture::new();
        let key = fixture.issue_key();
        let table = ActionTable::new()
            .on("default", |req: &ApiRequest| Ok(Dispatch::forward(req, "/loop")));
        let mut registry = EndpointRegistry::new();
        registry.register("ELoop", endpoint(table));

        let dispatcher = Dispatcher::with_max_hops(
            Arc::clone(&fixture.config),
            Arc::clone(&fixture.store) as Arc<dyn SessionStore>,
            Arc::new(registry),
            3,
        );
        let result = dispatcher.process_request(fixture.request("GET", "/loop", &key));
        assert!(matches!(result, Err(DispatchError::ForwardLoop { hops: 3 })));
    }
}
