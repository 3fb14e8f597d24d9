//! Integration test utilities for the concord client
//!
//! This crate provides a fake gateway (websocket) and a fake REST API, both
//! served by axum on loopback ports, so end-to-end tests can drive the real
//! transports.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
