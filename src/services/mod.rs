/// Outbound delivery to device sockets.
pub mod delivery;
/// OpenAPI documentation generation.
pub mod documentation;
/// Background re-election of users served by this process.
pub mod election_sweep;
/// Health check service.
pub mod health_service;
/// Bounded, self-releasing distributed lock helper.
pub mod lock;
/// Device presence bookkeeping in the coordination store.
pub mod presence_registry;
/// Deterministic player/remote election.
pub mod role_election;
/// Election followed by broadcast to local sockets.
pub mod roles_events;
/// Read-only queries backing the HTTP routes.
pub mod roles_service;
/// Coordination store health supervision and degraded mode.
pub mod store_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;
