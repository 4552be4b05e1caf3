// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for validator failover.
//!
//! This module defines the Kubernetes Custom Resource used to declare how a
//! multi-region validator cluster should be laid out across its scale sets.
//!
//! # Resource Types
//!
//! - [`ValidatorFailover`] - Declares the regions, failover mode and leader-detection
//!   metric of one validator cluster. Its status carries the persisted failover state.
//!
//! # Example: Declaring a single-mode failover
//!
//! ```rust,no_run
//! use validator_failover::crd::{FailoverMode, ValidatorFailoverSpec};
//!
//! let spec = ValidatorFailoverSpec {
//!     prefix: "dot".to_string(),
//!     resource_group: "validators".to_string(),
//!     locations: vec!["eastus".to_string(), "westeurope".to_string(), "centralus".to_string()],
//!     failover_mode: FailoverMode::Single,
//!     instances: vec![],
//!     metric_name: "validator_value".to_string(),
//!     metric_namespace: "polkadot".to_string(),
//!     delete_vms_with_api_in_single_mode: Some(true),
//! };
//! ```

use crate::constants::{DEFAULT_METRIC_NAME, DEFAULT_METRIC_NAMESPACE};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Condition represents an observation of a resource's current state.
///
/// Conditions are used in status subresources to communicate the state of
/// a resource to users and controllers.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition. This operator reports `Ready` and `ValidatorDetected`.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// How instances are spread across the configured locations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FailoverMode {
    /// Every location runs a statically declared number of instances.
    ///
    /// No leader discovery is performed: the count matrix is `spec.instances` verbatim.
    #[default]
    Distributed,

    /// Exactly one live instance, the elected validator, is kept.
    ///
    /// The count matrix holds a single `1` at the location currently hosting the
    /// validator. Standby instances are pruned when API-driven pruning is enabled.
    Single,
}

impl fmt::Display for FailoverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Distributed => write!(f, "distributed"),
            Self::Single => write!(f, "single"),
        }
    }
}

fn default_metric_name() -> String {
    DEFAULT_METRIC_NAME.to_string()
}

fn default_metric_namespace() -> String {
    DEFAULT_METRIC_NAMESPACE.to_string()
}

/// `ValidatorFailover` declares the desired layout of one validator cluster.
///
/// The operator discovers which scale set currently hosts the elected validator,
/// records a per-location instance count matrix in the status, and in single mode
/// optionally prunes every instance except the validator's.
///
/// # Example
///
/// ```yaml
/// apiVersion: failover.firestoned.io/v1alpha1
/// kind: ValidatorFailover
/// metadata:
///   name: dot-validators
///   namespace: validators
/// spec:
///   prefix: dot
///   resourceGroup: validators
///   locations: [eastus, westeurope, centralus]
///   failoverMode: distributed
///   instances: [1, 1, 1]
///   metricName: validator_value
///   metricNamespace: polkadot
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[kube(
    group = "failover.firestoned.io",
    version = "v1alpha1",
    kind = "ValidatorFailover",
    namespaced,
    shortname = "vfo",
    doc = "ValidatorFailover reconciles a multi-region validator cluster against its declared layout. It detects the currently elected validator from telemetry and publishes a per-location instance count matrix in its status.",
    printcolumn = r#"{"name":"Mode","type":"string","jsonPath":".spec.failoverMode"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
#[kube(status = "ValidatorFailoverStatus")]
#[serde(rename_all = "camelCase")]
pub struct ValidatorFailoverSpec {
    /// Naming prefix shared by every scale set of the cluster.
    pub prefix: String,

    /// Resource group (or project) that owns the scale sets.
    pub resource_group: String,

    /// Ordered list of locations (regions).
    ///
    /// The order is significant: it is the index space of `status.failoverInstances`
    /// and must stay stable across reconciliations.
    pub locations: Vec<String>,

    /// Failover mode, `distributed` (default) or `single`.
    #[serde(default)]
    pub failover_mode: FailoverMode,

    /// Instance count per location, aligned with `locations`.
    ///
    /// Only used in distributed mode, where it must have one entry per location.
    #[serde(default)]
    pub instances: Vec<i32>,

    /// Name of the metric the elected validator emits.
    #[serde(default = "default_metric_name")]
    pub metric_name: String,

    /// Namespace of the validator metric.
    #[serde(default = "default_metric_namespace")]
    pub metric_namespace: String,

    /// Delete standby instances through the provider API in single mode.
    ///
    /// Overrides the operator-wide `FAILOVER_DELETE_VMS_WITH_API_IN_SINGLE_MODE` flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_vms_with_api_in_single_mode: Option<bool>,
}

impl ValidatorFailoverSpec {
    /// Whether the count matrix is static configuration rather than live inference.
    #[must_use]
    pub fn is_distributed_mode(&self) -> bool {
        self.failover_mode == FailoverMode::Distributed
    }
}

/// Lifecycle phase of a `ValidatorFailover`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum FailoverPhase {
    /// No identity has been assigned yet.
    #[default]
    Uninitialized,
    /// A Create/Update pass is running or the last pass failed.
    Reconciling,
    /// The count matrix reflects the live fleet.
    Converged,
}

impl fmt::Display for FailoverPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Reconciling => write!(f, "Reconciling"),
            Self::Converged => write!(f, "Converged"),
        }
    }
}

/// `ValidatorFailover` status, the persisted failover state.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorFailoverStatus {
    /// Encoded failover identity, absent until the first successful Create.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Instance count per location, aligned with `spec.locations`.
    #[serde(default)]
    pub failover_instances: Vec<i32>,

    /// Current lifecycle phase.
    #[serde(default)]
    pub phase: FailoverPhase,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}
