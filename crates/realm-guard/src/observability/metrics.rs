//! Metrics definitions for the guard.
//!
//! All metrics follow Prometheus naming conventions:
//! - `guard_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `outcome`: 2 values (authenticated, unauthenticated)
//! - `error_type`: bounded by `AuthError` variants plus `none`
//!
//! The recorder is installed by the embedding service; without one these
//! calls are no-ops.

use metrics::{counter, histogram};
use std::time::Duration;

pub const AUTHENTICATIONS_TOTAL: &str = "guard_authentications_total";
pub const AUTHENTICATION_DURATION_SECONDS: &str = "guard_authentication_duration_seconds";
pub const KEY_TRIALS: &str = "guard_key_trials";

/// Record the terminal outcome of one authentication pass.
///
/// Metric: `guard_authentications_total`, `guard_authentication_duration_seconds`
/// Labels: `outcome`, `error_type`
pub fn record_authentication(error_type: Option<&'static str>, duration: Duration) {
    let outcome = if error_type.is_some() {
        "unauthenticated"
    } else {
        "authenticated"
    };

    histogram!(AUTHENTICATION_DURATION_SECONDS, "outcome" => outcome)
        .record(duration.as_secs_f64());

    counter!(AUTHENTICATIONS_TOTAL,
        "outcome" => outcome,
        "error_type" => error_type.unwrap_or("none")
    )
    .increment(1);
}

/// Record how many ring keys one verification tried.
///
/// Metric: `guard_key_trials`
#[allow(clippy::cast_precision_loss)] // key rings are tiny
pub fn record_key_trials(trials: usize) {
    histogram!(KEY_TRIALS).record(trials as f64);
}
