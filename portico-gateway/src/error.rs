//! Error types for the gateway crate.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use portico_engine::{DispatchError, SecurityError};

/// Errors that can occur while adapting HTTP traffic to the dispatcher.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// An error propagated from the dispatch engine.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The request body could not be read.
    #[error("invalid request body: {0}")]
    InvalidBody(String),
}

/// Status class for each engine failure.
///
/// Authentication failures are 403, routing misses 404, malformed input
/// 400, and loop detection plus handler faults 500.
fn status_for(err: &DispatchError) -> StatusCode {
    match err {
        DispatchError::Security(sec) => match sec {
            SecurityError::InvalidSecurityAction { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::FORBIDDEN,
        },
        DispatchError::NotAuthenticated | DispatchError::ServiceKeyRejected => {
            StatusCode::FORBIDDEN
        }
        DispatchError::Path(_) | DispatchError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        DispatchError::EndpointNotFound { .. } | DispatchError::ActionNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::Dispatch(err) => status_for(err),
            GatewayError::InvalidBody(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_core::CoreError;

    #[test]
    fn credential_failures_map_to_403() {
        let err = GatewayError::from(DispatchError::Security(SecurityError::MissingCredentials));
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);

        let err = GatewayError::from(DispatchError::NotAuthenticated);
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);

        let err = GatewayError::from(DispatchError::ServiceKeyRejected);
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn routing_failures_map_to_404() {
        let err = GatewayError::from(DispatchError::EndpointNotFound {
            endpoint_id: "EGhost".to_owned(),
        });
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);

        let err = GatewayError::from(DispatchError::ActionNotFound {
            endpoint_id: "EHello".to_owned(),
            action: "ghost".to_owned(),
        });
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn malformed_input_maps_to_400() {
        let err = GatewayError::from(DispatchError::Path(CoreError::MalformedPath {
            path: String::new(),
        }));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

        let err = GatewayError::from(DispatchError::Security(
            SecurityError::InvalidSecurityAction { action: "reset".to_owned() },
        ));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

        let err = GatewayError::from(DispatchError::BadRequest { message: "nope".to_owned() });
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn loop_detection_maps_to_500() {
        let err = GatewayError::from(DispatchError::ForwardLoop { hops: 20 });
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn error_display_includes_message() {
        let err = GatewayError::from(DispatchError::BadRequest { message: "bad field".to_owned() });
        assert!(err.to_string().contains("bad field"), "Display must include the message");
    }
}
