//! Endpoint handlers and their per-handler capability tables.

use std::collections::HashMap;

use portico_core::{ApiRequest, Dispatch};

use crate::error::DispatchError;

/// A single action handler: takes the current request, returns either a
/// terminal response or a forward instruction.
pub type ActionFn = Box<dyn Fn(&ApiRequest) -> Result<Dispatch, DispatchError> + Send + Sync>;

/// Capability table mapping symbolic action names to handlers.
///
/// Built once when the endpoint is constructed; the dispatcher probes it
/// with an ordered list of name variants instead of re-deriving names per
/// call.
#[derive(Default)]
pub struct ActionTable {
    actions: HashMap<String, ActionFn>,
}

impl ActionTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under an action name. Builder-style.
    ///
    /// Privileged variants carry the `__` marker in their registered name,
    /// e.g. `__getDetail`.
    #[must_use]
    pub fn on<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&ApiRequest) -> Result<Dispatch, DispatchError> + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), Box::new(handler));
        self
    }

    /// Look up a handler by exact action name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ActionFn> {
        self.actions.get(name)
    }

    /// Number of registered actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the table has no actions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl std::fmt::Debug for ActionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionTable")
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A named handler unit exposing one or more actions.
pub trait Endpoint: Send + Sync {
    /// The endpoint's capability table.
    fn actions(&self) -> &ActionTable;
}
