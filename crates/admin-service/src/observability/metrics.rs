//! Metrics definitions for the admin service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `admin_` prefix for service metrics (`token_cache_` for the shared cache)
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: HTTP verbs
//! - `endpoint`: the fixed route table, everything else is `/other`
//! - `status`: success, error, timeout
//! - `outcome`: `allow`, `deny`, or a token validation reason code
//! - `operation`: Management API operations named in code

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used by
/// `/metrics`.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("admin_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Management calls include a possible client-credentials exchange
        .set_buckets_for_metric(
            Matcher::Prefix("admin_management_request".to_string()),
            &[0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set management request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `admin_http_requests_total`, `admin_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("admin_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("admin_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Map a request path onto the fixed route table.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/v1/health" => "/v1/health",
        "/metrics" => "/metrics",
        "/authorize" => "/authorize",
        "/admin-api/users" => "/admin-api/users",
        "/admin-api/user/favorites" => "/admin-api/user/favorites",
        _ => "/other",
    }
}

// ============================================================================
// Token Validation Metrics
// ============================================================================

/// Record an inbound token decision.
///
/// Metric: `admin_token_validations_total`
/// Labels: `outcome`
pub fn record_token_validation(outcome: &'static str) {
    counter!("admin_token_validations_total", "outcome" => outcome).increment(1);
}

// ============================================================================
// Management API Metrics
// ============================================================================

/// Record a Management API call.
///
/// Metric: `admin_management_requests_total`,
/// `admin_management_request_duration_seconds`
/// Labels: `operation`, `status`
pub fn record_management_request(operation: &'static str, success: bool, duration: Duration) {
    let status = if success { "success" } else { "error" };

    histogram!("admin_management_request_duration_seconds",
        "operation" => operation,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("admin_management_requests_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    #[test]
    fn test_normalize_endpoint_known_and_unknown() {
        assert_eq!(normalize_endpoint("/v1/health"), "/v1/health");
        assert_eq!(normalize_endpoint("/admin-api/users"), "/admin-api/users");
        assert_eq!(normalize_endpoint("/admin-api/users/123"), "/other");
        assert_eq!(normalize_endpoint("/wp-login.php"), "/other");
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(201), "success");
        assert_eq!(categorize_status_code(401), "error");
        assert_eq!(categorize_status_code(504), "timeout");
    }

    #[test]
    fn test_record_functions_emit_expected_names() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_http_request("GET", "/admin-api/users", 200, Duration::from_millis(12));
            record_token_validation("expired");
            record_token_validation("expired");
            record_management_request("list_users", true, Duration::from_millis(80));
        });

        let snapshot = snapshotter.snapshot().into_vec();

        let validations = snapshot
            .iter()
            .find(|(key, _, _, _)| key.key().name() == "admin_token_validations_total")
            .map(|(_, _, _, value)| value)
            .unwrap();
        assert_eq!(*validations, DebugValue::Counter(2));

        for expected in [
            "admin_http_requests_total",
            "admin_http_request_duration_seconds",
            "admin_management_requests_total",
            "admin_management_request_duration_seconds",
        ] {
            assert!(
                snapshot
                    .iter()
                    .any(|(key, _, _, _)| key.key().name() == expected),
                "missing {expected}"
            );
        }
    }
}
