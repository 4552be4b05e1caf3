// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the validator failover operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the failover CRD
pub const API_GROUP: &str = "failover.firestoned.io";

/// API version for the failover CRD
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "failover.firestoned.io/v1alpha1";

/// Kind name for `ValidatorFailover` resource
pub const KIND_VALIDATOR_FAILOVER: &str = "ValidatorFailover";

// ============================================================================
// Failover Spec Defaults
// ============================================================================

/// Default metric emitted by the node that currently holds the validator role
pub const DEFAULT_METRIC_NAME: &str = "validator_value";

/// Default metric namespace for the validator signal
pub const DEFAULT_METRIC_NAMESPACE: &str = "polkadot";

/// Smallest sample value that marks a host as the elected validator
pub const VALIDATOR_METRIC_THRESHOLD: f64 = 0.0;

/// Default look-back window for validator metric queries (5 minutes)
pub const DEFAULT_METRIC_WINDOW_SECS: u64 = 300;

// ============================================================================
// Convergence Polling Constants
// ============================================================================

/// Fixed delay between two convergence poll attempts
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Upper bound on convergence poll attempts (10 minutes at the default interval)
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 120;

/// Instances left alive once a single-mode cluster has converged on its validator
pub const CONVERGED_INSTANCE_COUNT: usize = 1;

/// Instances left alive when the fleet is drained without a known validator
pub const DRAINED_INSTANCE_COUNT: usize = 0;

// ============================================================================
// Operation Deadline Constants
// ============================================================================

/// Create/Update deadline, long enough to cover pruning and convergence polling (90 minutes)
pub const DEFAULT_CREATE_TIMEOUT_SECS: u64 = 5400;

/// Read deadline, no mutation is performed on this path (30 minutes)
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 1800;

// ============================================================================
// Identity Constants
// ============================================================================

/// Version tag prepended to every encoded failover identity
pub const IDENTITY_PREFIX: &str = "fo1";

// ============================================================================
// Controller Error Handling Constants
// ============================================================================

/// Requeue duration for controller errors (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Requeue duration once a failover has converged (5 minutes)
pub const CONVERGED_REQUEUE_DURATION_SECS: u64 = 300;

/// Requeue duration while no validator is observable yet (30 seconds)
pub const PENDING_REQUEUE_DURATION_SECS: u64 = 30;

// ============================================================================
// Leader Election Constants
// ============================================================================

/// Name of the Lease object used for operator leader election
pub const LEADER_LEASE_NAME: &str = "validator-failover-leader";

/// Default leader election lease duration (15 seconds)
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 15;

/// Default leader election grace period before the lease is renewed (5 seconds)
pub const DEFAULT_LEASE_GRACE_SECS: u64 = 5;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Per-request timeout of fleet gateway calls
pub const FLEET_API_REQUEST_TIMEOUT_SECS: u64 = 60;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
