//! Background tasks for the admin service.
//!
//! - `idle_shutdown` - Stops the server after a period without requests

pub mod idle_shutdown;

pub use idle_shutdown::{start_idle_shutdown, ActivityTracker, IdleShutdownConfig};
