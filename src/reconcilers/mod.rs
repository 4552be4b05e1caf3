// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes reconciliation controllers.
//!
//! # Reconciliation Architecture
//!
//! The operator follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - Monitor `ValidatorFailover` changes via the Kubernetes API
//! 2. **Reconcile** - Run Create/Update or Read against the live fleet
//! 3. **Status** - Persist the failover identity and count matrix in the status subresource
//!
//! # Available Reconcilers
//!
//! - [`reconcile_validator_failover`] - Creates/updates or refreshes a failover resource
//! - [`delete_validator_failover`] - Releases a failover resource
//!
//! # Example: Using a Reconciler
//!
//! ```rust,no_run
//! use validator_failover::reconcilers::reconcile_validator_failover;
//! use validator_failover::crd::ValidatorFailover;
//! use validator_failover::context::Context;
//! use std::sync::Arc;
//!
//! async fn reconcile(ctx: Arc<Context>, failover: ValidatorFailover) -> anyhow::Result<()> {
//!     reconcile_validator_failover(ctx, failover).await?;
//!     Ok(())
//! }
//! ```

pub mod failover;
pub mod finalizers;
pub mod status;

pub use failover::{delete_validator_failover, reconcile_validator_failover};

/// Check if a resource's spec has changed by comparing generation with `observed_generation`.
///
/// `metadata.generation` is incremented by the API server only when the spec
/// changes, while `status.observedGeneration` is written by the controller after
/// processing a spec.
///
/// # Returns
///
/// * `true` - Spec changed or first reconciliation
/// * `false` - Spec unchanged, or no generation tracking available
///
/// # Example
///
/// ```rust
/// use validator_failover::reconcilers::should_reconcile;
///
/// assert!(should_reconcile(Some(2), Some(1)));
/// assert!(should_reconcile(Some(1), None));
/// assert!(!should_reconcile(Some(2), Some(2)));
/// ```
#[must_use]
pub fn should_reconcile(current_generation: Option<i64>, observed_generation: Option<i64>) -> bool {
    match (current_generation, observed_generation) {
        (Some(current), Some(observed)) => current != observed,
        (Some(_), None) => true, // First reconciliation
        _ => false,              // No generation tracking available
    }
}
