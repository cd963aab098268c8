//! Built-in endpoints registered at startup.
//!
//! Each endpoint builds its capability table once in its constructor;
//! privileged actions carry the `__` marker in their registered name.

use std::sync::Arc;

use serde_json::json;

use portico_core::{ApiRequest, Dispatch};
use portico_engine::{ActionTable, Endpoint, EndpointRegistry};

use crate::config::GatewayConfig;

/// Greets with a configurable message.
pub struct HelloEndpoint {
    table: ActionTable,
}

impl HelloEndpoint {
    /// Build the endpoint with the greeting from config params.
    #[must_use]
    pub fn new(greeting: impl Into<String>) -> Self {
        let greeting = greeting.into();
        let table = ActionTable::new()
            .on("default", move |_req: &ApiRequest| {
                Ok(Dispatch::ok_json(json!({ "hello": greeting })))
            })
            // The retired path clients may still call; re-dispatched
            // internally, no redirect round trip.
            .on("legacy", |req: &ApiRequest| Ok(Dispatch::forward(req, "/hello/default")));
        Self { table }
    }
}

impl Endpoint for HelloEndpoint {
    fn actions(&self) -> &ActionTable {
        &self.table
    }
}

/// User lookups; detail fields require service authorization.
pub struct UserEndpoint {
    table: ActionTable,
}

impl UserEndpoint {
    #[must_use]
    pub fn new() -> Self {
        let table = ActionTable::new()
            .on("default", |req: &ApiRequest| {
                let name = req
                    .post_value("name")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("anonymous");
                Ok(Dispatch::ok_json(json!({ "user": name })))
            })
            .on("__get", |req: &ApiRequest| {
                let name = req
                    .post_value("name")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("anonymous");
                Ok(Dispatch::ok_json(json!({
                    "user": name,
                    "email": format!("{name}@example.org"),
                    "auth": format!("{:?}", req.auth),
                })))
            });
        Self { table }
    }
}

impl Default for UserEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl Endpoint for UserEndpoint {
    fn actions(&self) -> &ActionTable {
        &self.table
    }
}

/// Accepts uploads and answers with the received file metadata.
pub struct UploadEndpoint {
    table: ActionTable,
}

impl UploadEndpoint {
    #[must_use]
    pub fn new() -> Self {
        let table = ActionTable::new().on("postDefault", |req: &ApiRequest| {
            let received: Vec<_> = req
                .files
                .iter()
                .map(|file| {
                    json!({
                        "name": file.name,
                        "contentType": file.content_type,
                        "size": file.size,
                    })
                })
                .collect();
            Ok(Dispatch::ok_json(json!({ "received": received })))
        });
        Self { table }
    }
}

impl Default for UploadEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl Endpoint for UploadEndpoint {
    fn actions(&self) -> &ActionTable {
        &self.table
    }
}

/// Populate the registry with the built-in endpoints.
#[must_use]
pub fn build_registry(config: &GatewayConfig) -> EndpointRegistry {
    let greeting = config.param("hello").unwrap_or("world").to_owned();

    let mut registry = EndpointRegistry::new();
    registry.register("EHello", Arc::new(HelloEndpoint::new(greeting)));
    registry.register("EUser", Arc::new(UserEndpoint::new()));
    registry.register("EUpload", Arc::new(UploadEndpoint::new()));
    registry
}
