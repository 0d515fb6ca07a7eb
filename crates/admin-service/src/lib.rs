//! Cruise Admin Service Library
//!
//! HTTP backend for the Cruise admin console:
//!
//! - Auth0 user administration through the Management API, with the
//!   management token served by the shared three-tier cache in `common`
//! - Inbound JWT validation against the tenant's JWKS
//! - An API gateway token authorizer
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/*.rs -> handlers/*.rs -> services/*.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Token validation, audience policy, gateway authorizer
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Admin guard, activity tracking, HTTP metrics
//! - `models` - Request and response bodies
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router and application state
//! - `services` - Auth0 Management API client
//! - `tasks` - Idle shutdown

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
pub mod tasks;
