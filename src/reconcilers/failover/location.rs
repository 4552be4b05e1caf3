// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Mapping of the validator's scale set onto the configured locations.

use crate::fleet::VmInventory;

/// Canonical form of a location name: lowercase with whitespace removed.
///
/// Providers report `"East US"` and `"eastus"` interchangeably.
#[must_use]
pub fn normalize_location(location: &str) -> String {
    location
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Index in `locations` of the region hosting `scale_set_name`.
///
/// The region is read from the scale set's first instance in `inventory`.
/// Returns `None` when `scale_set_name` is empty (no validator), when the scale
/// set has no instances, or when its region is not configured.
#[must_use]
pub fn resolve_location_index(
    inventory: &VmInventory,
    locations: &[String],
    scale_set_name: &str,
) -> Option<usize> {
    if scale_set_name.is_empty() {
        return None;
    }

    let location = normalize_location(&inventory.instances(scale_set_name).first()?.location);
    locations
        .iter()
        .position(|candidate| normalize_location(candidate) == location)
}

#[cfg(test)]
#[path = "location_tests.rs"]
mod location_tests;
