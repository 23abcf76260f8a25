//! # Organization Service Test Utilities
//!
//! Shared test utilities for the organization service.
//!
//! This crate provides:
//! - Server test harness (`TestOrgServer` for E2E tests)
//! - ES256, RS256 and HS256 signing fixtures
//! - Claim builder (`TestTokenBuilder`)
//! - Mocked key-set endpoint (`mount_key_set`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use org_test_utils::*;
//!
//! #[sqlx::test(migrations = "../../migrations")]
//! async fn test_example(pool: PgPool) -> Result<()> {
//!     let key = TestSigningKey::generate("key-1")?;
//!     let key_set = MockServer::start().await;
//!     mount_key_set(&key_set, &[key.jwk_json()], None).await;
//!
//!     let server = TestOrgServer::spawn(pool, &key_set_url(&key_set)).await?;
//!     let token = key.sign(&TestTokenBuilder::new().build())?;
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/api/me", server.url()))
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod key_set_mock;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use key_set_mock::*;
pub use server_harness::*;
pub use token_builders::*;
