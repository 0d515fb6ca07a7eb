//! Middleware for the admin service.
//!
//! # Components
//!
//! - `auth` - Admin token check for the `/admin-api` routes
//! - `activity` - Last-request tracking for idle shutdown
//! - `http_metrics` - HTTP request metrics

pub mod activity;
pub mod auth;
pub mod http_metrics;

pub use activity::track_activity;
pub use auth::{require_admin, AuthState};
pub use http_metrics::http_metrics_middleware;
