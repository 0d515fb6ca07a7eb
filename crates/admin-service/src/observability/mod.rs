//! Observability module for the admin service.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;
