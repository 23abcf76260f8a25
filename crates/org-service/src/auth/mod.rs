//! Bearer token authentication.
//!
//! # Components
//!
//! - `jwks` - Key-set source trait and TTL cache with refresh-on-miss
//! - `jwt` - Token verifier dispatching on the declared algorithm
//! - `claims` - Token claims and the authenticated identity

pub mod claims;
pub mod jwks;
pub mod jwt;

pub use claims::AuthenticatedUser;
pub use jwks::{HttpKeySetSource, JwksClient, KeySetSource};
pub use jwt::TokenVerifier;
