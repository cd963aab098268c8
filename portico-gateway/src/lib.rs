//! HTTP gateway for the Portico API front controller.
//!
//! Adapts HTTP traffic into the engine's request model, carries the session
//! identifier, and maps engine failures onto status codes with a JSON error
//! envelope.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod endpoints;
pub mod error;
pub mod http;
