//! Session storage with actor pattern
//!
//! StateManager owns a SessionStore and processes messages via channels,
//! providing serialized access to session records.

mod manager;
mod messages;
mod store;

pub use manager::StateManager;
pub use messages::{StateCommand, StateError, StateResponse};
pub use store::{InMemorySessionStore, SessionStore};
