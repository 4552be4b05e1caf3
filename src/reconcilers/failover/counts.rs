// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-location instance count matrix.
//!
//! The matrix is indexed like `spec.locations`. In distributed mode it is the
//! configured layout; in single mode it holds a single `1` at the validator's
//! location, or nothing at all while no validator is known.

use crate::crd::ValidatorFailoverSpec;

/// Input of [`build_counts`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountSource<'a> {
    /// Statically configured counts, used verbatim
    Distributed(&'a [i32]),
    /// Location index of the validator, if one was resolved
    Single(Option<usize>),
}

/// Build the count matrix for `num_locations` locations.
///
/// An index outside the location range yields an all-zero matrix.
#[must_use]
pub fn build_counts(source: CountSource<'_>, num_locations: usize) -> Vec<i32> {
    match source {
        CountSource::Distributed(instances) => instances.to_vec(),
        CountSource::Single(index) => {
            let mut counts = vec![0; num_locations];
            if let Some(slot) = index.and_then(|i| counts.get_mut(i)) {
                *slot = 1;
            }
            counts
        }
    }
}

/// Replace a degenerate matrix with the baseline layout of `spec`.
///
/// A matrix is degenerate when its length does not match `spec.locations`. The
/// baseline is `spec.instances` in distributed mode and one instance in the first
/// location in single mode. Well-formed matrices, including all-zero ones, are
/// returned unchanged.
#[must_use]
pub fn fill_default_counts(counts: Vec<i32>, spec: &ValidatorFailoverSpec) -> Vec<i32> {
    let num_locations = spec.locations.len();
    if counts.len() == num_locations {
        return counts;
    }

    if spec.is_distributed_mode() && spec.instances.len() == num_locations {
        spec.instances.clone()
    } else {
        build_counts(CountSource::Single(Some(0)), num_locations)
    }
}

#[cfg(test)]
#[path = "counts_tests.rs"]
mod counts_tests;
