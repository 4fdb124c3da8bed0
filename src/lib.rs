//! Library crate for roles-coordinator, exposing modules for binaries and integration tests.

/// Runtime configuration.
pub mod config;
/// Coordination store access.
pub mod dao;
/// Wire types for HTTP and WebSocket clients.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// HTTP routers.
pub mod routes;
/// Presence, election and transport services.
pub mod services;
/// Shared application state and domain types.
pub mod state;
