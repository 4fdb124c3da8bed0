/// Key layout of the coordination store.
pub mod keys;
/// Flat device record encoding.
pub mod models;
/// Coordination store abstraction and its backends.
pub mod presence_store;
/// Storage error types shared by every backend.
pub mod storage;
