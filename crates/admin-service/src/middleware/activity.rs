//! Request activity tracking for idle shutdown.

use crate::tasks::ActivityTracker;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Mark the tracker on every request, before it is handled.
pub async fn track_activity(
    State(tracker): State<Arc<ActivityTracker>>,
    request: Request,
    next: Next,
) -> Response {
    tracker.touch();
    next.run(request).await
}
