//! Axum transport boundary for the Portico dispatcher.
//!
//! Every non-health request is adapted into an [`ApiRequest`] and handed to
//! the engine; the transport never routes beyond the single catch-all. The
//! session identifier rides the `x-session-id` header and is echoed on
//! every response so clients can persist it.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequest, Multipart, State},
    http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, Request as HttpRequest, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{Map, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use portico_core::{ApiRequest, ApiResponse, FileUpload, Headers, ResponseBody, SessionId};
use portico_engine::{Dispatcher, InMemorySessionStore, SecurityConfig, SessionStore};

use crate::{config::GatewayConfig, endpoints::build_registry, error::GatewayError};

/// Header carrying the opaque session identifier.
pub const HEADER_SESSION_ID: &str = "x-session-id";

/// Upper bound on accepted request bodies.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared gateway state.
#[derive(Clone)]
pub struct AppState {
    dispatcher: Arc<Dispatcher>,
}

/// Build the application router around an existing dispatcher.
pub fn create_router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(dispatch)
        .with_state(AppState { dispatcher })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Compose store, registry, and dispatcher from config and return the
/// ready router.
#[must_use]
pub fn build_app(config: &GatewayConfig) -> Router {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let dispatcher = Dispatcher::new(
        Arc::new(SecurityConfig::new(config.services.clone())),
        store,
        Arc::new(build_registry(config)),
    );
    create_router(Arc::new(dispatcher))
}

/// `GET /health` — liveness probe.
async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

/// Catch-all: adapt the HTTP request and run one dispatch cycle.
async fn dispatch(State(state): State<AppState>, request: HttpRequest<Body>) -> Response {
    let session = session_from(request.headers());
    let headers: Headers = request
        .headers()
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
        .collect();
    let method = request.method().as_str().to_owned();
    let path = request.uri().path().to_owned();

    let (post, files) = match read_payload(request).await {
        Ok(payload) => payload,
        Err(e) => return e.into_response(),
    };

    let mut api_request = ApiRequest::new(session, method, path);
    api_request.headers = headers;
    api_request.post = post;
    api_request.files = files;

    let mut response = match state.dispatcher.process_request(api_request) {
        Ok(response) => render(response),
        Err(e) => GatewayError::from(e).into_response(),
    };
    if let Ok(value) = HeaderValue::from_str(&session.to_string()) {
        response.headers_mut().insert(HEADER_SESSION_ID, value);
    }
    response
}

/// Adapt the request body into POST fields and uploaded-file metadata.
///
/// Multipart bodies contribute their text fields to the POST map and their
/// file fields as metadata; anything else is read as JSON. Routing never
/// depends on the body, so a non-JSON payload becomes an empty field map
/// rather than a rejection.
async fn read_payload(
    request: HttpRequest<Body>,
) -> Result<(Map<String, Value>, Vec<FileUpload>), GatewayError> {
    if is_multipart(request.headers()) {
        return read_multipart(request).await;
    }
    let bytes = axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| GatewayError::InvalidBody(e.to_string()))?;
    let post = serde_json::from_slice(&bytes).unwrap_or_default();
    Ok((post, Vec::new()))
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| {
            value.trim_start().to_ascii_lowercase().starts_with("multipart/form-data")
        })
}

/// Walk the multipart stream. The payload bytes are consumed here; only
/// their metadata crosses into the engine.
async fn read_multipart(
    request: HttpRequest<Body>,
) -> Result<(Map<String, Value>, Vec<FileUpload>), GatewayError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| GatewayError::InvalidBody(e.to_string()))?;

    let mut post = Map::new();
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GatewayError::InvalidBody(e.to_string()))?
    {
        if let Some(file_name) = field.file_name() {
            let file_name = file_name.to_owned();
            let content_type = field.content_type().map(str::to_owned);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| GatewayError::InvalidBody(e.to_string()))?;
            files.push(FileUpload::new(file_name, content_type, bytes.len() as u64));
        } else {
            let name = field.name().unwrap_or_default().to_owned();
            let text = field
                .text()
                .await
                .map_err(|e| GatewayError::InvalidBody(e.to_string()))?;
            post.insert(name, Value::String(text));
        }
    }
    Ok((post, files))
}

/// Session id from the carrier header, or a fresh one for new clients.
fn session_from(headers: &HeaderMap) -> SessionId {
    headers
        .get(HEADER_SESSION_ID)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
        .map_or_else(SessionId::new, SessionId::from)
}

/// Serialize a terminal engine response onto the wire.
fn render(response: ApiResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match response.body {
        ResponseBody::Json(value) => (status, Json(value)).into_response(),
        ResponseBody::Text(text) => (status, text).into_response(),
        ResponseBody::Empty => status.into_response(),
    }
}
