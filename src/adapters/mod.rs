//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the coordination services to external systems:
//! - `bus` - Message bus backends (Pusher, Ably, in-memory)
//! - `store` - Whiteboard snapshot stores (Redis, in-memory)
//! - `registry` - Live session registry
//! - `directory` - Relational session mirror (PostgreSQL, in-memory)
//! - `auth` - Bearer-token verification (JWT, mock)
//! - `http` - axum surface

pub mod auth;
pub mod bus;
pub mod directory;
pub mod http;
pub mod registry;
pub mod store;
