//! Explicit endpoint registry, populated at startup.
//!
//! Endpoint identifiers are plain string keys (`E` + capitalized token from
//! the path); a miss is an explicit `None`, never a runtime type lookup.

use std::collections::HashMap;
use std::sync::Arc;

use crate::endpoint::Endpoint;

/// Resolution seam between the dispatcher and the handler population.
pub trait EndpointResolver: Send + Sync {
    /// Look up a handler by its registry key, e.g. `EHello`.
    fn endpoint(&self, endpoint_id: &str) -> Option<Arc<dyn Endpoint>>;
}

/// Startup-populated mapping from endpoint key to handler.
#[derive(Default)]
pub struct EndpointRegistry {
    endpoints: HashMap<String, Arc<dyn Endpoint>>,
}

impl EndpointRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under an endpoint key, replacing any previous one.
    pub fn register(&mut self, endpoint_id: impl Into<String>, endpoint: Arc<dyn Endpoint>) {
        self.endpoints.insert(endpoint_id.into(), endpoint);
    }

    /// Number of registered endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Whether the registry has no endpoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl EndpointResolver for EndpointRegistry {
    fn endpoint(&self, endpoint_id: &str) -> Option<Arc<dyn Endpoint>> {
        self.endpoints.get(endpoint_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::ActionTable;
    use portico_core::{ApiResponse, Dispatch};

    struct NullEndpoint {
        table: ActionTable,
    }

    impl NullEndpoint {
        fn new() -> Self {
            Self {
                table: ActionTable::new()
                    .on("default", |_req| Ok(Dispatch::Terminal(ApiResponse::empty(200)))),
            }
        }
    }

    impl Endpoint for NullEndpoint {
        fn actions(&self) -> &ActionTable {
            &self.table
        }
    }

    #[test]
    fn lookup_hits_registered_endpoint() {
        let mut registry = EndpointRegistry::new();
        registry.register("EHello", Arc::new(NullEndpoint::new()));
        assert!(registry.endpoint("EHello").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn lookup_miss_is_explicit_none() {
        let registry = EndpointRegistry::new();
        assert!(registry.endpoint("EGhost").is_none());
        assert!(registry.is_empty());
    }
}
