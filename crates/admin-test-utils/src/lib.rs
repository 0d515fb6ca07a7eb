//! # Admin Test Utilities
//!
//! Shared test utilities for the admin service.
//!
//! This crate provides:
//! - Deterministic RSA signing fixtures (fixed keys with matching JWKs)
//! - Token builders (`TestTokenBuilder`)
//! - A mocked Auth0 tenant (`MockIdentityProvider`)
//! - Server test harness (`TestAdminServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use admin_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let idp = MockIdentityProvider::start().await;
//!     let key = SigningKeyFixture::primary();
//!     idp.mount_jwks(&[&key]).await;
//!
//!     let token = TestTokenBuilder::new(&idp.issuer())
//!         .with_audience(ADMIN_AUDIENCE)
//!         .with_roles(&["admin"])
//!         .sign(&key)?;
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_auth0;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use mock_auth0::*;
pub use server_harness::*;
pub use token_builders::*;
