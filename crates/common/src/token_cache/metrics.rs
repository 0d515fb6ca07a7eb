//! Token cache metrics.
//!
//! Labels are bounded: `tier` is one of `memory`, `store`, `provider`;
//! `reason` and `kind` come from fixed match arms in the callers.

use metrics::counter;

/// A token was served from `tier`.
pub fn record_lookup(tier: &'static str) {
    counter!("token_cache_lookups_total", "tier" => tier).increment(1);
}

/// A Tier 2 read was treated as a miss because of `reason`.
pub fn record_store_read_failure(reason: &'static str) {
    counter!("token_cache_store_read_failures_total", "reason" => reason).increment(1);
}

/// A Tier 2 write-back failed.
pub fn record_store_write_failure() {
    counter!("token_cache_store_write_failures_total").increment(1);
}

/// A Tier 3 exchange failed.
pub fn record_provider_failure(kind: &'static str) {
    counter!("token_cache_provider_failures_total", "kind" => kind).increment(1);
}
