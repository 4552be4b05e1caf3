// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Single-mode convergence: prune standby instances and wait for the fleet to settle.
//!
//! # Protocol
//!
//! 1. Select every instance whose hostname differs from the validator's. A
//!    validator whose host is absent from the inventory snapshot counts as unknown
//! 2. Delete them, one request per scale set, optionally shrinking capacity
//! 3. Poll the topology until the live instance count reaches the target
//!    (`1` with a known validator, `0` when draining)
//! 4. With a known validator, poll telemetry until it is re-detected on the survivor
//!
//! Every step completes before the next one starts. A failure aborts the pass
//! without cleanup: the next pass recomputes everything from the live fleet, so
//! running the protocol against a converged fleet deletes nothing and returns on
//! the first poll.

use super::poll::{poll_until, PollPolicy, PollResult};
use super::validator::wait_for_validator;
use crate::config::FailoverSettings;
use crate::constants::{CONVERGED_INSTANCE_COUNT, DRAINED_INSTANCE_COUNT};
use crate::failover_errors::FailoverError;
use crate::metrics;
use crate::fleet::{
    FleetClients, InstanceMutator, MetricQuery, TopologyEnumerator, Validator, ValidatorLookup,
    VmInventory,
};
use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// What a convergence run acts on.
#[derive(Clone, Copy, Debug)]
pub struct ConvergenceRequest<'a> {
    pub resource_group: &'a str,
    pub prefix: &'a str,
    /// Validator located before pruning
    pub validator: &'a ValidatorLookup,
    /// Inventory snapshot taken before pruning
    pub inventory: &'a VmInventory,
    /// Query used to re-detect the validator after pruning
    pub validator_query: &'a MetricQuery,
}

/// Outcome of a convergence run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConvergenceReport {
    /// No validator is known and draining is disabled, nothing was touched
    Skipped,
    /// The fleet reached its target
    Converged {
        /// Instances deleted by this run
        deleted: usize,
        /// Live instance count that was waited for
        remaining: usize,
        /// Validator re-detected on the surviving instance
        validator: Option<Validator>,
    },
}

impl ConvergenceReport {
    /// Instances deleted by this run.
    #[must_use]
    pub fn deleted(&self) -> usize {
        match self {
            Self::Skipped => 0,
            Self::Converged { deleted, .. } => *deleted,
        }
    }
}

/// Delete `to_delete` scale set by scale set.
///
/// Stops at the first failed request.
///
/// # Errors
///
/// Returns [`FailoverError::InstanceDeletion`] naming the scale set whose request failed.
pub async fn delete_instances(
    mutator: &dyn InstanceMutator,
    resource_group: &str,
    to_delete: &BTreeMap<String, Vec<String>>,
    adjust_capacity: bool,
) -> Result<usize, FailoverError> {
    let mut deleted = 0;

    for (scale_set, instance_ids) in to_delete {
        info!(
            scale_set = %scale_set,
            count = instance_ids.len(),
            adjust_capacity = adjust_capacity,
            "Deleting standby instances"
        );

        mutator
            .delete_instances(resource_group, scale_set, instance_ids, adjust_capacity)
            .await
            .map_err(|source| {
                error!(scale_set = %scale_set, error = %source, "Instance deletion failed");
                FailoverError::InstanceDeletion {
                    scale_set: scale_set.clone(),
                    instance_count: instance_ids.len(),
                    source,
                }
            })?;

        deleted += instance_ids.len();
    }

    Ok(deleted)
}

/// Poll the topology until exactly `expected` instances remain.
///
/// # Errors
///
/// - [`FailoverError::ConvergenceTimeout`] when the attempt bound is exhausted
/// - [`FailoverError::Gateway`] on the first topology failure
pub async fn wait_for_instance_count(
    topology: &dyn TopologyEnumerator,
    prefix: &str,
    resource_group: &str,
    expected: usize,
    policy: &PollPolicy,
) -> Result<usize, FailoverError> {
    info!(expected = expected, "Waiting for instance count");

    let result = poll_until(policy, "wait for instance count", || async {
        let observed = topology
            .list_instances(prefix, resource_group)
            .await
            .map_err(|source| FailoverError::Gateway {
                operation: "list instances",
                source,
            })?
            .size();

        debug!(expected = expected, observed = observed, "Instance count");
        Ok::<_, FailoverError>(if observed == expected {
            ControlFlow::Break(observed)
        } else {
            ControlFlow::Continue(observed)
        })
    })
    .await?;

    match result {
        PollResult::Ready { value, attempts } => {
            info!(count = value, attempts = attempts, "Instance count converged");
            Ok(value)
        }
        PollResult::Exhausted { last, attempts } => {
            warn!(
                expected = expected,
                observed = last,
                attempts = attempts,
                "Instance count did not converge"
            );
            Err(FailoverError::ConvergenceTimeout {
                expected,
                observed: last,
                attempts,
            })
        }
    }
}

/// Run the convergence protocol.
///
/// Without a known validator, pruning is skipped unless
/// `settings.prune_without_validator` is set, in which case every instance is
/// deleted and the fleet is waited on to drain. Telemetry covers a trailing
/// window, so a validator reported on a host missing from `request.inventory`
/// is treated as unknown.
///
/// # Errors
///
/// Returns the first deletion, topology, metrics or poll-bound failure.
pub async fn converge(
    fleet: &FleetClients,
    settings: &FailoverSettings,
    request: &ConvergenceRequest<'_>,
) -> Result<ConvergenceReport, FailoverError> {
    let validator = match request.validator.validator() {
        Some(validator) if !request.inventory.contains_hostname(&validator.hostname) => {
            warn!(
                scale_set = %validator.scale_set_name,
                hostname = %validator.hostname,
                "Validator host missing from inventory, treating validator as unknown"
            );
            None
        }
        validator => validator,
    };

    if validator.is_none() && !settings.prune_without_validator {
        warn!(
            prefix = %request.prefix,
            instances = request.inventory.size(),
            "No validator known, not pruning instances"
        );
        return Ok(ConvergenceReport::Skipped);
    }

    let started = Instant::now();
    let result = prune_and_wait(fleet, settings, request, validator).await;

    let outcome = match &result {
        Ok(_) => "converged",
        Err(e) if e.is_poll_timeout() => "timeout",
        Err(_) => "error",
    };
    metrics::record_convergence(outcome, started.elapsed());

    result
}

async fn prune_and_wait(
    fleet: &FleetClients,
    settings: &FailoverSettings,
    request: &ConvergenceRequest<'_>,
    validator: Option<&Validator>,
) -> Result<ConvergenceReport, FailoverError> {
    let keep_hostname = validator.map_or("", |v| v.hostname.as_str());
    let to_delete = request.inventory.vms_to_delete(keep_hostname);

    let deleted = delete_instances(
        fleet.mutator.as_ref(),
        request.resource_group,
        &to_delete,
        settings.adjust_capacity_on_prune,
    )
    .await?;
    metrics::record_instances_pruned(request.prefix, deleted);

    let wait_for_count = if validator.is_some() {
        CONVERGED_INSTANCE_COUNT
    } else {
        DRAINED_INSTANCE_COUNT
    };

    let remaining = wait_for_instance_count(
        fleet.topology.as_ref(),
        request.prefix,
        request.resource_group,
        wait_for_count,
        &settings.poll,
    )
    .await?;

    let redetected = match validator {
        Some(validator) => Some(
            wait_for_validator(
                fleet.metrics.as_ref(),
                request.validator_query,
                &validator.hostname,
                &settings.poll,
            )
            .await?,
        ),
        None => None,
    };

    info!(deleted = deleted, remaining = remaining, "Fleet converged");

    Ok(ConvergenceReport::Converged {
        deleted,
        remaining,
        validator: redetected,
    })
}

#[cfg(test)]
#[path = "convergence_tests.rs"]
mod convergence_tests;
