// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers and the `ValidatorFailover` status updater.
//!
//! # Condition Format
//!
//! Conditions follow the Kubernetes conventions:
//! - `type`: The aspect being reported (`Ready`, `ValidatorDetected`)
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: A programmatic identifier (CamelCase)
//! - `message`: A human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp of the last status change
//!
//! # Example
//!
//! ```rust,no_run
//! use validator_failover::reconcilers::status::create_condition;
//!
//! let condition = create_condition(
//!     "Ready",
//!     "True",
//!     "Converged",
//!     "Count matrix reflects the live fleet"
//! );
//! ```

use crate::crd::{Condition, FailoverPhase, ValidatorFailover, ValidatorFailoverStatus};
use anyhow::Result;
use chrono::Utc;
use kube::api::Patch;
use kube::{api::PatchParams, Api, Client, ResourceExt};
use serde_json::json;
use tracing::debug;

/// Create a new condition stamped with the current time.
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Find a condition by type.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Update or add a condition in a conditions list (in-memory, no API call).
///
/// The `lastTransitionTime` of an existing condition is preserved while its
/// status stays the same, and reset when the status flips.
pub fn update_condition_in_memory(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        let last_transition_time = if existing.status == status {
            existing
                .last_transition_time
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339())
        } else {
            Utc::now().to_rfc3339()
        };

        existing.status = status.to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
        existing.last_transition_time = Some(last_transition_time);
    } else {
        conditions.push(create_condition(condition_type, status, reason, message));
    }
}

/// Compare two condition lists, ignoring `lastTransitionTime`.
#[must_use]
pub fn conditions_equal(current: &[Condition], new: &[Condition]) -> bool {
    if current.len() != new.len() {
        return false;
    }

    new.iter().all(|new_cond| {
        find_condition(current, &new_cond.r#type).is_some_and(|curr_cond| {
            curr_cond.status == new_cond.status
                && curr_cond.reason == new_cond.reason
                && curr_cond.message == new_cond.message
        })
    })
}

/// Collects the status changes of one `ValidatorFailover` pass and applies them
/// in a single API call.
///
/// A single patch per pass avoids the extra "object updated" events that several
/// status writes would trigger.
///
/// # Example
///
/// ```rust,ignore
/// use validator_failover::reconcilers::status::FailoverStatusUpdater;
///
/// let mut updater = FailoverStatusUpdater::new(&failover);
/// updater.set_failover_state(outcome.resource.id.clone(), &outcome.resource.failover_instances);
/// updater.set_phase(FailoverPhase::Converged);
/// updater.set_condition("Ready", "True", "Converged", "Count matrix is up to date");
/// updater.apply(&client).await?;
/// ```
pub struct FailoverStatusUpdater {
    namespace: String,
    name: String,
    current_status: Option<ValidatorFailoverStatus>,
    new_status: ValidatorFailoverStatus,
}

impl FailoverStatusUpdater {
    /// Start from the current status of `failover`, or an empty one.
    #[must_use]
    pub fn new(failover: &ValidatorFailover) -> Self {
        let current_status = failover.status.clone();
        let new_status = current_status.clone().unwrap_or_default();

        Self {
            namespace: failover.namespace().unwrap_or_default(),
            name: failover.name_any(),
            current_status,
            new_status,
        }
    }

    /// Update or add a condition (in-memory only, no API call).
    pub fn set_condition(
        &mut self,
        condition_type: &str,
        status: &str,
        reason: &str,
        message: &str,
    ) {
        update_condition_in_memory(
            &mut self.new_status.conditions,
            condition_type,
            status,
            reason,
            message,
        );
    }

    /// Replace the persisted failover state: identity and count matrix.
    pub fn set_failover_state(&mut self, id: Option<String>, failover_instances: &[i32]) {
        self.new_status.id = id;
        failover_instances.clone_into(&mut self.new_status.failover_instances);
    }

    pub fn set_phase(&mut self, phase: FailoverPhase) {
        self.new_status.phase = phase;
    }

    pub fn set_observed_generation(&mut self, generation: Option<i64>) {
        self.new_status.observed_generation = generation;
    }

    /// Whether the collected status differs semantically from the current one.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        match &self.current_status {
            None => true,
            Some(current) => {
                current.id != self.new_status.id
                    || current.failover_instances != self.new_status.failover_instances
                    || current.phase != self.new_status.phase
                    || current.observed_generation != self.new_status.observed_generation
                    || !conditions_equal(&current.conditions, &self.new_status.conditions)
            }
        }
    }

    /// The status that [`apply`](Self::apply) would write.
    #[must_use]
    pub fn status(&self) -> &ValidatorFailoverStatus {
        &self.new_status
    }

    /// Write the collected status, skipping the call when nothing changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the Kubernetes API call fails.
    pub async fn apply(&self, client: &Client) -> Result<()> {
        if !self.has_changes() {
            debug!(
                "ValidatorFailover {}/{} status unchanged, skipping update",
                self.namespace, self.name
            );
            return Ok(());
        }

        let api: Api<ValidatorFailover> = Api::namespaced(client.clone(), &self.namespace);
        let patch = json!({
            "status": self.new_status
        });

        api.patch_status(&self.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;

        debug!(
            "Updated ValidatorFailover {}/{} status: phase {}, counts {:?}",
            self.namespace, self.name, self.new_status.phase, self.new_status.failover_instances
        );

        Ok(())
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
