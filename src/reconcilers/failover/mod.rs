// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `ValidatorFailover` reconciliation logic.
//!
//! Maps the controller lifecycle onto the failover operations:
//!
//! - deletion timestamp set: **Delete**, no remote action, finalizer released
//! - no identity yet, or the spec generation moved: **Create/Update**, chained into Read
//! - otherwise: **Read**, re-entered on every requeue
//!
//! ## Module Structure
//!
//! - [`convergence`] - Pruning of standby instances and bounded convergence polls
//! - [`counts`] - Count matrix builder
//! - [`location`] - Scale set to location resolution
//! - [`poll`] - Fixed-interval bounded polling
//! - [`resource`] - Create/Read/Delete state machine
//! - [`validation`] - Spec validation
//! - [`validator`] - Validator detection from telemetry

pub mod convergence;
pub mod counts;
pub mod location;
pub mod poll;
pub mod resource;
pub mod validation;
pub mod validator;

pub use resource::{FailoverEngine, FailoverOutcome, FailoverResource};

use crate::context::Context;
use crate::crd::{FailoverPhase, ValidatorFailover};
use crate::failover_errors::FailoverError;
use crate::fleet::ValidatorLookup;
use crate::labels::FINALIZER_VALIDATOR_FAILOVER;
use crate::metrics;
use crate::reconcilers::finalizers::{ensure_finalizer, handle_deletion, FinalizerCleanup};
use crate::reconcilers::should_reconcile;
use crate::reconcilers::status::FailoverStatusUpdater;
use crate::status_reasons::{
    CONDITION_TYPE_READY, CONDITION_TYPE_VALIDATOR_DETECTED, REASON_CONVERGED,
    REASON_NO_SCALE_SETS, REASON_PROGRESSING, REASON_STATIC_LAYOUT, REASON_VALIDATOR_FOUND,
    REASON_VALIDATOR_NOT_FOUND,
};
use anyhow::Result;
use kube::{Client, ResourceExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Operation run by one reconciliation pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FailoverOperation {
    CreateOrUpdate,
    Read,
}

impl FailoverOperation {
    /// Label used in logs and metrics.
    fn as_str(self) -> &'static str {
        match self {
            Self::CreateOrUpdate => "create",
            Self::Read => "read",
        }
    }
}

/// Choose the operation for `failover`.
///
/// Create/Update runs until an identity is persisted and again whenever the
/// spec generation moves past `status.observedGeneration`.
fn select_operation(failover: &ValidatorFailover) -> FailoverOperation {
    let status = failover.status.as_ref();
    let has_identity = status.is_some_and(|s| s.id.is_some());
    let observed_generation = status.and_then(|s| s.observed_generation);

    if !has_identity || should_reconcile(failover.metadata.generation, observed_generation) {
        FailoverOperation::CreateOrUpdate
    } else {
        FailoverOperation::Read
    }
}

/// Persisted failover state of `failover`.
fn resource_from(failover: &ValidatorFailover) -> FailoverResource {
    let status = failover.status.as_ref();
    FailoverResource {
        id: status.and_then(|s| s.id.clone()),
        spec: Some(failover.spec.clone()),
        failover_instances: status
            .map(|s| s.failover_instances.clone())
            .unwrap_or_default(),
    }
}

/// `ValidatorDetected` condition for a single-mode outcome, `None` in distributed mode.
fn validator_condition(
    outcome: &FailoverOutcome,
) -> Option<(&'static str, &'static str, String)> {
    match outcome.validator.as_ref()? {
        ValidatorLookup::Found(validator) => Some((
            "True",
            REASON_VALIDATOR_FOUND,
            format!(
                "Validator {} runs in scale set {}",
                validator.hostname, validator.scale_set_name
            ),
        )),
        ValidatorLookup::NotFound if outcome.scale_sets.is_empty() => Some((
            "False",
            REASON_NO_SCALE_SETS,
            "No scale set with the configured prefix exists yet".to_string(),
        )),
        ValidatorLookup::NotFound => Some((
            "False",
            REASON_VALIDATOR_NOT_FOUND,
            format!(
                "No instance in {} scale set(s) reports the validator metric",
                outcome.scale_sets.len()
            ),
        )),
    }
}

/// Record a successful pass in `updater` and return the phase it commits.
fn apply_outcome(
    updater: &mut FailoverStatusUpdater,
    failover: &ValidatorFailover,
    outcome: &FailoverOutcome,
) -> FailoverPhase {
    let resource = &outcome.resource;
    updater.set_failover_state(resource.id.clone(), &resource.failover_instances);

    if !resource.is_initialized() {
        updater.set_phase(FailoverPhase::Uninitialized);
        return FailoverPhase::Uninitialized;
    }
    updater.set_phase(FailoverPhase::Converged);

    let (reason, message) = if failover.spec.is_distributed_mode() {
        (
            REASON_STATIC_LAYOUT,
            format!(
                "Static layout {:?} across {} location(s)",
                resource.failover_instances,
                failover.spec.locations.len()
            ),
        )
    } else {
        (
            REASON_CONVERGED,
            format!(
                "Count matrix {:?} reflects the live fleet",
                resource.failover_instances
            ),
        )
    };
    updater.set_condition(CONDITION_TYPE_READY, "True", reason, &message);

    if let Some((status, reason, message)) = validator_condition(outcome) {
        updater.set_condition(CONDITION_TYPE_VALIDATOR_DETECTED, status, reason, &message);
    }

    updater.set_observed_generation(failover.metadata.generation);
    FailoverPhase::Converged
}

/// Record a failed pass in `updater`. The persisted failover state is left untouched.
fn apply_failure(updater: &mut FailoverStatusUpdater, err: &FailoverError) {
    updater.set_phase(FailoverPhase::Reconciling);
    updater.set_condition(CONDITION_TYPE_READY, "False", err.reason(), &err.to_string());
}

#[async_trait::async_trait]
impl FinalizerCleanup for ValidatorFailover {
    async fn cleanup(&self, _client: &Client) -> Result<()> {
        let namespace = self.namespace().unwrap_or_default();
        let name = self.name_any();

        // Fleet teardown belongs to the provisioning layer
        info!(
            "Releasing ValidatorFailover {}/{}, no fleet resources are deleted",
            namespace, name
        );
        metrics::clear_failover_state(&namespace, &name, &self.spec.locations);
        Ok(())
    }
}

/// Reconciles a `ValidatorFailover` resource.
///
/// Runs Create/Update (chained into Read) or Read against the fleet and
/// commits the resulting identity and count matrix to the status subresource.
/// A failed pass leaves the persisted state unchanged and reports the cause in
/// the `Ready` condition.
///
/// Returns the phase committed by this pass, so the caller can pick its requeue
/// interval without waiting for the watch to deliver the new status. A deleted
/// object reports [`FailoverPhase::Uninitialized`].
///
/// # Arguments
///
/// * `ctx` - Controller context with the Kubernetes client and fleet collaborators
/// * `failover` - The `ValidatorFailover` resource to reconcile
///
/// # Errors
///
/// Returns an error if the failover pass, the finalizer patch or the status
/// update fails.
pub async fn reconcile_validator_failover(
    ctx: Arc<Context>,
    failover: ValidatorFailover,
) -> Result<FailoverPhase> {
    let client = &ctx.client;
    let namespace = failover.namespace().unwrap_or_default();
    let name = failover.name_any();

    info!("Reconciling ValidatorFailover: {}/{}", namespace, name);

    if failover.metadata.deletion_timestamp.is_some() {
        delete_validator_failover(ctx.clone(), failover).await?;
        return Ok(FailoverPhase::Uninitialized);
    }

    ensure_finalizer(client, &failover, FINALIZER_VALIDATOR_FAILOVER).await?;

    let operation = select_operation(&failover);
    debug!(
        namespace = %namespace,
        name = %name,
        operation = operation.as_str(),
        mode = %failover.spec.failover_mode,
        generation = ?failover.metadata.generation,
        "Starting ValidatorFailover reconciliation"
    );

    // Status the final patch is compared against
    let mut baseline = failover.clone();

    if operation == FailoverOperation::CreateOrUpdate {
        let mut progressing = FailoverStatusUpdater::new(&failover);
        progressing.set_phase(FailoverPhase::Reconciling);
        progressing.set_condition(
            CONDITION_TYPE_READY,
            "False",
            REASON_PROGRESSING,
            "Reconciling the fleet against the declared layout",
        );
        progressing.apply(client).await?;
        baseline.status = Some(progressing.status().clone());
    }

    let resource = resource_from(&failover);
    let engine = ctx.engine();
    let started = Instant::now();

    let result = match operation {
        FailoverOperation::CreateOrUpdate => engine.create_or_update(&resource).await,
        FailoverOperation::Read => engine.read(&resource).await,
    };

    let mut updater = FailoverStatusUpdater::new(&baseline);

    match result {
        Ok(outcome) => {
            metrics::record_reconciliation_success(operation.as_str(), started.elapsed());
            if let Some(report) = &outcome.convergence {
                debug!(deleted = report.deleted(), "Convergence report");
            }

            let detected = outcome.validator.as_ref().map(ValidatorLookup::is_found);
            metrics::record_failover_state(
                &namespace,
                &name,
                &failover.spec.locations,
                &outcome.resource.failover_instances,
                detected,
            );

            let phase = apply_outcome(&mut updater, &failover, &outcome);
            updater.apply(client).await?;

            info!(
                "ValidatorFailover {}/{} {} pass committed counts {:?}",
                namespace,
                name,
                operation.as_str(),
                outcome.resource.failover_instances
            );
            Ok(phase)
        }
        Err(err) => {
            error!(
                "ValidatorFailover {}/{} {} pass failed: {}",
                namespace,
                name,
                operation.as_str(),
                err
            );
            metrics::record_reconciliation_error(
                operation.as_str(),
                err.category(),
                started.elapsed(),
            );

            apply_failure(&mut updater, &err);
            if let Err(status_err) = updater.apply(client).await {
                warn!(
                    "Failed to record failure on ValidatorFailover {}/{}: {}",
                    namespace, name, status_err
                );
            }
            Err(err.into())
        }
    }
}

/// Deletes a `ValidatorFailover`: clears its failover state and releases the finalizer.
///
/// No remote action is taken against the fleet.
///
/// # Errors
///
/// Returns an error if the finalizer cannot be removed.
pub async fn delete_validator_failover(
    ctx: Arc<Context>,
    failover: ValidatorFailover,
) -> Result<()> {
    let started = Instant::now();
    let cleared = ctx.engine().delete(&resource_from(&failover));
    debug!(
        name = %failover.name_any(),
        initialized = cleared.is_initialized(),
        "Failover state cleared"
    );

    handle_deletion(&ctx.client, &failover, FINALIZER_VALIDATOR_FAILOVER).await?;
    metrics::record_reconciliation_success("delete", started.elapsed());
    Ok(())
}
