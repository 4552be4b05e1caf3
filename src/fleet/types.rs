// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Data types exchanged with the fleet gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// The instance currently holding the validator role.
///
/// This is an observation, never configuration: every reconciliation pass
/// re-reads it from telemetry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validator {
    /// Scale set hosting the validator
    pub scale_set_name: String,
    /// Hostname of the validator instance
    pub hostname: String,
}

/// Outcome of a validator lookup.
///
/// `NotFound` is an expected branch (fresh cluster, election in progress),
/// not a failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidatorLookup {
    /// A host reports the validator signal
    Found(Validator),
    /// No host currently reports the validator signal
    NotFound,
}

impl ValidatorLookup {
    /// The located validator, if any.
    #[must_use]
    pub fn validator(&self) -> Option<&Validator> {
        match self {
            Self::Found(validator) => Some(validator),
            Self::NotFound => None,
        }
    }

    /// Scale set of the located validator, or an empty string.
    #[must_use]
    pub fn scale_set_name(&self) -> &str {
        self.validator().map_or("", |v| v.scale_set_name.as_str())
    }

    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Metric aggregation applied by the gateway over the query window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Maximum,
    Minimum,
    Average,
    Total,
    Count,
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Maximum => "maximum",
            Self::Minimum => "minimum",
            Self::Average => "average",
            Self::Total => "total",
            Self::Count => "count",
        };
        f.write_str(name)
    }
}

/// A metrics query across a set of scale sets.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricQuery {
    /// Scale sets to query, in the order used for tie-breaking
    pub scale_set_names: Vec<String>,
    pub resource_group: String,
    pub metric_name: String,
    pub metric_namespace: String,
    pub aggregation: Aggregation,
    /// How far back the gateway looks
    pub window: Duration,
}

/// One aggregated metric value for one instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    pub scale_set_name: String,
    pub hostname: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// A scale-set member instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmInstance {
    /// Provider instance identifier used for deletion
    pub instance_id: String,
    pub hostname: String,
    /// Location (region) the instance runs in
    pub location: String,
}

/// Snapshot of every instance of a cluster, keyed by scale set name.
///
/// Read fresh on each pass and only ever filtered, never mutated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VmInventory {
    scale_sets: BTreeMap<String, Vec<VmInstance>>,
}

impl VmInventory {
    #[must_use]
    pub fn new(scale_sets: BTreeMap<String, Vec<VmInstance>>) -> Self {
        Self { scale_sets }
    }

    /// Total number of instances across all scale sets.
    #[must_use]
    pub fn size(&self) -> usize {
        self.scale_sets.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Instances of one scale set (empty when the scale set is unknown).
    #[must_use]
    pub fn instances(&self, scale_set_name: &str) -> &[VmInstance] {
        self.scale_sets
            .get(scale_set_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Iterate scale sets in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<VmInstance>)> {
        self.scale_sets.iter()
    }

    /// Whether any scale set holds an instance named `hostname`.
    #[must_use]
    pub fn contains_hostname(&self, hostname: &str) -> bool {
        !hostname.is_empty()
            && self
                .scale_sets
                .values()
                .flatten()
                .any(|vm| vm.hostname == hostname)
    }

    /// Instance IDs per scale set whose hostname differs from `keep_hostname`.
    ///
    /// Scale sets with nothing to delete are omitted. An empty `keep_hostname`
    /// selects every instance.
    #[must_use]
    pub fn vms_to_delete(&self, keep_hostname: &str) -> BTreeMap<String, Vec<String>> {
        self.scale_sets
            .iter()
            .filter_map(|(scale_set, instances)| {
                let ids: Vec<String> = instances
                    .iter()
                    .filter(|vm| keep_hostname.is_empty() || vm.hostname != keep_hostname)
                    .map(|vm| vm.instance_id.clone())
                    .collect();
                (!ids.is_empty()).then(|| (scale_set.clone(), ids))
            })
            .collect()
    }
}

impl FromIterator<(String, Vec<VmInstance>)> for VmInventory {
    fn from_iter<I: IntoIterator<Item = (String, Vec<VmInstance>)>>(iter: I) -> Self {
        Self {
            scale_sets: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;
