//! Shared building blocks for the Cruise admin backend.
//!
//! The centerpiece is [`token_cache::TokenCacheManager`], which hands out
//! Auth0 Management API tokens from a three-tier lookaside cache
//! (process memory, durable parameter store, identity provider).

#![warn(clippy::pedantic)]

/// Secret types that prevent accidental logging
pub mod secret;

/// Unverified JWT header parsing and bearer extraction
pub mod jwt;

/// Durable shared key-value store abstraction and backends
pub mod parameter_store;

/// Auth0 credential bundle loading
pub mod credentials;

/// Tiered management token cache
pub mod token_cache;
