//! HTTP adapter - axum surface for the realtime endpoints.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod routes;

pub use handlers::LiveHandlers;
pub use middleware::{auth_middleware, AuthState, RequireAuth};
pub use routes::live_routes;
