//! Terminal responses and the forward instruction handlers can return.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::request::ApiRequest;

/// Payload of a terminal response. Serialization to the wire is a
/// transport concern; the core only carries the shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseBody {
    /// A JSON document.
    Json(Value),
    /// Plain text.
    Text(String),
    /// No body.
    Empty,
}

/// A terminal response: status code plus opaque body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ApiResponse {
    /// HTTP status code to deliver.
    pub status: u16,
    /// Response payload.
    pub body: ResponseBody,
}

impl ApiResponse {
    /// A JSON response with the given status.
    #[must_use]
    pub fn json(status: u16, value: Value) -> Self {
        Self { status, body: ResponseBody::Json(value) }
    }

    /// A `200 OK` JSON response.
    #[must_use]
    pub fn ok_json(value: Value) -> Self {
        Self::json(200, value)
    }

    /// A plain-text response with the given status.
    #[must_use]
    pub fn text(status: u16, text: impl Into<String>) -> Self {
        Self { status, body: ResponseBody::Text(text.into()) }
    }

    /// A bodyless response with the given status.
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self { status, body: ResponseBody::Empty }
    }
}

/// What a handler invocation produced: either a terminal response or an
/// instruction to re-dispatch to another endpoint without a new round trip.
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// Deliver this response and stop.
    Terminal(ApiResponse),
    /// Replace the current request and run the loop again.
    Forward(ApiRequest),
}

impl Dispatch {
    /// Shorthand for a terminal `200 OK` JSON result.
    #[must_use]
    pub fn ok_json(value: Value) -> Self {
        Self::Terminal(ApiResponse::ok_json(value))
    }

    /// Shorthand for forwarding the given request to a new path.
    #[must_use]
    pub fn forward(request: &ApiRequest, path: impl Into<String>) -> Self {
        Self::Forward(request.forward_to(path))
    }
}
