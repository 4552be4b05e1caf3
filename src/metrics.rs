// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the validator failover operator.
//!
//! All metrics carry the namespace prefix `failover_firestoned_io_`
//! (prometheus-safe version of "failover.firestoned.io").
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - Create/Read/Delete passes and their outcomes
//! - **Fleet Metrics** - Pruned instances and convergence waits
//! - **Failover State Metrics** - Validator detection and the published count matrix
//! - **Leader Election Metrics** - Operator replica leadership
//!
//! # Example
//!
//! ```rust,no_run
//! use validator_failover::metrics::record_reconciliation_success;
//!
//! record_reconciliation_success("read", std::time::Duration::from_secs(1));
//! ```

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all failover metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "failover_firestoned_io";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry, exposed on the `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliation passes by operation and outcome
///
/// Labels:
/// - `operation`: `create`, `read` or `delete`
/// - `outcome`: `success` or `error`
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliation passes by operation and outcome",
    );
    let counter = CounterVec::new(opts, &["operation", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliation passes in seconds
///
/// Create passes include convergence polling and can run for over an hour.
///
/// Labels:
/// - `operation`: `create`, `read` or `delete`
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliation passes in seconds by operation",
    )
    .buckets(vec![
        0.01, 0.1, 0.5, 1.0, 5.0, 30.0, 60.0, 300.0, 900.0, 1800.0, 5400.0,
    ]);
    let histogram = HistogramVec::new(opts, &["operation"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Total number of failed passes by operation and error category
///
/// Labels:
/// - `operation`: `create`, `read` or `delete`
/// - `error_type`: `gateway_error`, `timeout`, `deadline`, `validation_error`, `identity_error` or `api_error`
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_errors_total"),
        "Total number of errors by operation and error category",
    );
    let counter = CounterVec::new(opts, &["operation", "error_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Fleet Metrics
// ============================================================================

/// Total number of standby instances deleted by the convergence engine
///
/// Labels:
/// - `prefix`: Naming prefix of the validator cluster
pub static INSTANCES_PRUNED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_instances_pruned_total"),
        "Total number of standby instances deleted during convergence",
    );
    let counter = CounterVec::new(opts, &["prefix"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of convergence runs in seconds
///
/// Labels:
/// - `outcome`: `converged`, `timeout` or `error`
pub static CONVERGENCE_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_convergence_duration_seconds"),
        "Duration of convergence runs (pruning plus bounded polls) in seconds",
    )
    .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0]);
    let histogram = HistogramVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Failover State Metrics
// ============================================================================

/// Whether the last pass detected a validator
///
/// Labels:
/// - `namespace`, `name`: The `ValidatorFailover` object
///
/// Value: 1 if detected, 0 otherwise
pub static VALIDATOR_DETECTED: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_validator_detected"),
        "Whether the last pass detected a validator (1 = detected, 0 = not found)",
    );
    let gauge = GaugeVec::new(opts, &["namespace", "name"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Published instance count per location
///
/// Labels:
/// - `namespace`, `name`: The `ValidatorFailover` object
/// - `location`: Configured location
pub static FAILOVER_INSTANCES: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_failover_instances"),
        "Published instance count per location",
    );
    let gauge = GaugeVec::new(opts, &["namespace", "name", "location"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Leader Election Metrics
// ============================================================================

/// Total number of leader election events
///
/// Labels:
/// - `status`: Event type (`acquired`, `lost`)
pub static LEADER_ELECTIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_leader_elections_total"),
        "Total number of leader election events by status",
    );
    let counter = CounterVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Current leader election status
///
/// Labels:
/// - `pod_name`: Name of the pod
///
/// Value: 1 if leader, 0 if follower
pub static LEADER_STATUS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_leader_status"),
        "Current leader election status (1 = leader, 0 = follower)",
    );
    let gauge = GaugeVec::new(opts, &["pod_name"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a successful pass
pub fn record_reconciliation_success(operation: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[operation, "success"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration.as_secs_f64());
}

/// Record a failed pass
///
/// # Arguments
/// * `operation` - `create`, `read` or `delete`
/// * `error_type` - Error category, see [`ERRORS_TOTAL`]
/// * `duration` - Duration of the pass before failure
pub fn record_reconciliation_error(operation: &str, error_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[operation, "error"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration.as_secs_f64());
    ERRORS_TOTAL
        .with_label_values(&[operation, error_type])
        .inc();
}

/// Record instances deleted by one convergence run
#[allow(clippy::cast_precision_loss)]
pub fn record_instances_pruned(prefix: &str, count: usize) {
    INSTANCES_PRUNED_TOTAL
        .with_label_values(&[prefix])
        .inc_by(count as f64);
}

/// Record the duration of one convergence run
pub fn record_convergence(outcome: &str, duration: Duration) {
    CONVERGENCE_DURATION_SECONDS
        .with_label_values(&[outcome])
        .observe(duration.as_secs_f64());
}

/// Publish the committed state of a `ValidatorFailover`
///
/// # Arguments
/// * `locations` - Configured locations, aligned with `counts`
/// * `counts` - Committed count matrix
/// * `validator_detected` - `None` in distributed mode, where no detection runs
pub fn record_failover_state(
    namespace: &str,
    name: &str,
    locations: &[String],
    counts: &[i32],
    validator_detected: Option<bool>,
) {
    for (location, count) in locations.iter().zip(counts) {
        FAILOVER_INSTANCES
            .with_label_values(&[namespace, name, location])
            .set(f64::from(*count));
    }
    if let Some(detected) = validator_detected {
        VALIDATOR_DETECTED
            .with_label_values(&[namespace, name])
            .set(if detected { 1.0 } else { 0.0 });
    }
}

/// Drop every series published for a deleted `ValidatorFailover`
pub fn clear_failover_state(namespace: &str, name: &str, locations: &[String]) {
    for location in locations {
        let _ = FAILOVER_INSTANCES.remove_label_values(&[namespace, name, location]);
    }
    let _ = VALIDATOR_DETECTED.remove_label_values(&[namespace, name]);
}

/// Record leader election acquired
pub fn record_leader_elected(pod_name: &str) {
    LEADER_ELECTIONS_TOTAL
        .with_label_values(&["acquired"])
        .inc();
    LEADER_STATUS.with_label_values(&[pod_name]).set(1.0);
}

/// Record a replica waiting for the lease, without counting an election event
pub fn record_leader_standby(pod_name: &str) {
    LEADER_STATUS.with_label_values(&[pod_name]).set(0.0);
}

/// Record leader election lost
pub fn record_leader_lost(pod_name: &str) {
    LEADER_ELECTIONS_TOTAL.with_label_values(&["lost"]).inc();
    LEADER_STATUS.with_label_values(&[pod_name]).set(0.0);
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
