// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Standard Kubernetes status condition reasons for `ValidatorFailover` resources.
//!
//! This module defines constants for condition reasons following Kubernetes conventions.
//! Reasons are programmatic identifiers in CamelCase that explain why a condition has
//! a particular status.
//!
//! # Condition Types
//!
//! - `Ready` - the encompassing condition. `True` once the count matrix reflects the
//!   live fleet, `False` with the failure reason when a pass aborted.
//! - `ValidatorDetected` - whether telemetry currently shows an elected validator.
//!   Not reported in distributed mode, where no discovery happens.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   id: fo1.eyJwcmVmaXgiOiJkb3QiLCJtb2RlIjoic2luZ2xlIn0
//!   failoverInstances: [0, 1, 0]
//!   phase: Converged
//!   conditions:
//!     - type: Ready
//!       status: "True"
//!       reason: Converged
//!       message: "Instance counts per location: [0, 1, 0]"
//!     - type: ValidatorDetected
//!       status: "True"
//!       reason: ValidatorFound
//!       message: "Validator runs on host dot-westeurope-000001 in scale set dot-westeurope"
//! ```

// ============================================================================
// Ready Condition Reasons
// ============================================================================

/// The count matrix was rebuilt from the live fleet.
pub const REASON_CONVERGED: &str = "Converged";

/// The count matrix is the statically configured distributed layout.
pub const REASON_STATIC_LAYOUT: &str = "StaticLayout";

/// A reconciliation pass is in progress.
pub const REASON_PROGRESSING: &str = "Progressing";

/// The spec violates a structural invariant (see `FailoverError::InvalidSpec`).
pub const REASON_INVALID_SPEC: &str = "InvalidSpec";

/// The persisted identity could not be decoded.
pub const REASON_IDENTITY_DECODE_FAILED: &str = "IdentityDecodeFailed";

/// The failover identity could not be encoded from the spec.
pub const REASON_IDENTITY_ENCODE_FAILED: &str = "IdentityEncodeFailed";

/// The instance count did not reach its target within the poll budget.
pub const REASON_CONVERGENCE_TIMEOUT: &str = "ConvergenceTimeout";

/// The validator was not re-detected after pruning within the poll budget.
pub const REASON_VALIDATOR_WAIT_TIMEOUT: &str = "ValidatorWaitTimeout";

/// The operation-wide deadline elapsed.
pub const REASON_DEADLINE_EXCEEDED: &str = "DeadlineExceeded";

// ============================================================================
// Fleet Gateway Reasons
// ============================================================================

/// The fleet gateway failed or returned an unexpected response.
pub const REASON_GATEWAY_ERROR: &str = "GatewayError";

/// The fleet gateway rejected the configured credentials.
pub const REASON_GATEWAY_UNAUTHORIZED: &str = "GatewayUnauthorized";

/// Deleting standby instances failed part-way. The next pass recomputes from live state.
pub const REASON_INSTANCE_DELETION_FAILED: &str = "InstanceDeletionFailed";

// ============================================================================
// ValidatorDetected Condition Reasons
// ============================================================================

/// Telemetry shows an elected validator.
pub const REASON_VALIDATOR_FOUND: &str = "ValidatorFound";

/// No host currently reports the validator signal.
///
/// **Note:** This is not a failure. The count matrix is still published with
/// the no-leader layout and `Ready` stays `True`.
pub const REASON_VALIDATOR_NOT_FOUND: &str = "ValidatorNotFound";

/// No scale set with the configured prefix exists yet.
pub const REASON_NO_SCALE_SETS: &str = "NoScaleSets";

// ============================================================================
// Condition Types
// ============================================================================

/// Encompassing readiness condition type
pub const CONDITION_TYPE_READY: &str = "Ready";

/// Validator discovery condition type
pub const CONDITION_TYPE_VALIDATOR_DETECTED: &str = "ValidatorDetected";
