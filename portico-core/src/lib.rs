//! Core types for the Portico API front controller.
//!
//! Defines the shared data model: routes resolved from raw paths, the
//! per-call request value with its credential headers, terminal responses,
//! and the forward instruction that drives the dispatch loop.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod request;
pub mod response;
pub mod route;

pub use error::CoreError;
pub use request::{
    ApiRequest, AuthState, FileUpload, Headers, SessionId, HEADER_ACCESS_KEY,
    HEADER_SERVICE_KEY, HEADER_SERVICE_NAME,
};
pub use response::{ApiResponse, Dispatch, ResponseBody};
pub use route::{Route, DEFAULT_ACTION, ENDPOINT_MARKER, SECURITY_ENDPOINT, SECURITY_ENDPOINT_ID};
