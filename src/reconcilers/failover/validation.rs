// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Structural validation of a `ValidatorFailoverSpec`.
//!
//! Runs before any remote call so that an invalid spec never reaches the fleet.

use super::location::normalize_location;
use crate::crd::ValidatorFailoverSpec;
use crate::failover_errors::FailoverError;
use std::collections::HashSet;

fn invalid(reason: impl Into<String>) -> FailoverError {
    FailoverError::InvalidSpec {
        reason: reason.into(),
    }
}

/// Check the invariants of `spec`.
///
/// # Errors
///
/// Returns [`FailoverError::InvalidSpec`] when:
/// - `prefix` or `resourceGroup` is blank
/// - `locations` is empty or contains the same region twice
/// - any entry of `instances` is negative
/// - distributed mode does not supply one count per location
pub fn validate_spec(spec: &ValidatorFailoverSpec) -> Result<(), FailoverError> {
    if spec.prefix.trim().is_empty() {
        return Err(invalid("prefix must not be empty"));
    }
    if spec.resource_group.trim().is_empty() {
        return Err(invalid("resourceGroup must not be empty"));
    }
    if spec.locations.is_empty() {
        return Err(invalid("locations must list at least one region"));
    }

    let mut seen = HashSet::new();
    for location in &spec.locations {
        let normalized = normalize_location(location);
        if normalized.is_empty() {
            return Err(invalid("locations must not contain blank entries"));
        }
        if !seen.insert(normalized) {
            return Err(invalid(format!("location '{location}' is listed more than once")));
        }
    }

    if let Some(count) = spec.instances.iter().find(|count| **count < 0) {
        return Err(invalid(format!("instance counts must not be negative, got {count}")));
    }

    if spec.is_distributed_mode() && spec.instances.len() != spec.locations.len() {
        return Err(invalid(format!(
            "distributed mode needs one instance count per location ({} locations, {} counts)",
            spec.locations.len(),
            spec.instances.len()
        )));
    }

    Ok(())
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod validation_tests;
