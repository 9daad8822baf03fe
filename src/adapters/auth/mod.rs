//! Auth provider adapters.

mod jwt;
mod mock;

pub use jwt::{Claims, JwtAuthProvider};
pub use mock::MockAuthProvider;
