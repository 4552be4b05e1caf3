// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Validator discovery from telemetry.
//!
//! The elected validator is the instance emitting the highest value of the
//! validator metric. Discovery is a pure read: a missing validator is reported
//! as [`ValidatorLookup::NotFound`], only gateway failures are errors.

use super::poll::{poll_until, PollPolicy, PollResult};
use crate::constants::VALIDATOR_METRIC_THRESHOLD;
use crate::crd::ValidatorFailoverSpec;
use crate::failover_errors::{FailoverError, GatewayError};
use crate::fleet::{
    Aggregation, MetricQuery, MetricSample, MetricsGateway, Validator, ValidatorLookup,
};
use std::ops::ControlFlow;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Build the validator metric query for `scale_set_names`.
#[must_use]
pub fn validator_query(
    spec: &ValidatorFailoverSpec,
    scale_set_names: &[String],
    window: Duration,
) -> MetricQuery {
    MetricQuery {
        scale_set_names: scale_set_names.to_vec(),
        resource_group: spec.resource_group.clone(),
        metric_name: spec.metric_name.clone(),
        metric_namespace: spec.metric_namespace.clone(),
        aggregation: Aggregation::Maximum,
        window,
    }
}

fn is_elected(sample: &MetricSample) -> bool {
    sample.value.is_finite() && sample.value > VALIDATOR_METRIC_THRESHOLD
}

/// Pick the validator from a set of samples.
///
/// The sample with the greatest elected value wins. Ties go to the scale set
/// listed first in `scale_set_names`, then to the sample seen first, so repeated
/// passes over the same telemetry always agree. Samples from scale sets outside
/// `scale_set_names` and samples without a hostname are ignored.
#[must_use]
pub fn select_validator(scale_set_names: &[String], samples: &[MetricSample]) -> ValidatorLookup {
    let mut best: Option<&MetricSample> = None;

    for (position, scale_set) in scale_set_names.iter().enumerate() {
        // Duplicate names keep their first position
        if scale_set_names[..position].contains(scale_set) {
            continue;
        }

        for sample in samples
            .iter()
            .filter(|s| &s.scale_set_name == scale_set && !s.hostname.is_empty())
            .filter(|s| is_elected(s))
        {
            if best.is_none_or(|current| sample.value > current.value) {
                best = Some(sample);
            }
        }
    }

    best.map_or(ValidatorLookup::NotFound, |sample| {
        ValidatorLookup::Found(Validator {
            scale_set_name: sample.scale_set_name.clone(),
            hostname: sample.hostname.clone(),
        })
    })
}

/// Locate the current validator across `query.scale_set_names`.
///
/// No query is issued when the scale set list is empty.
///
/// # Errors
///
/// Returns the gateway error unchanged when the metrics query fails.
pub async fn locate_validator(
    metrics: &dyn MetricsGateway,
    query: &MetricQuery,
) -> Result<ValidatorLookup, GatewayError> {
    if query.scale_set_names.is_empty() {
        debug!("No scale sets to query for the validator metric");
        return Ok(ValidatorLookup::NotFound);
    }

    let samples = metrics.query(query).await?;
    let lookup = select_validator(&query.scale_set_names, &samples);

    match &lookup {
        ValidatorLookup::Found(validator) => info!(
            scale_set = %validator.scale_set_name,
            hostname = %validator.hostname,
            samples = samples.len(),
            "Found validator"
        ),
        ValidatorLookup::NotFound => warn!(
            metric = %query.metric_name,
            namespace = %query.metric_namespace,
            scale_sets = query.scale_set_names.len(),
            samples = samples.len(),
            "No instance reports the validator metric"
        ),
    }

    Ok(lookup)
}

/// Poll until the validator is detected on `hostname`.
///
/// Detections on any other host keep polling.
///
/// # Errors
///
/// - [`FailoverError::ValidatorWaitTimeout`] when the attempt bound is exhausted
/// - [`FailoverError::Gateway`] on the first metrics failure
pub async fn wait_for_validator(
    metrics: &dyn MetricsGateway,
    query: &MetricQuery,
    hostname: &str,
    policy: &PollPolicy,
) -> Result<Validator, FailoverError> {
    info!(hostname = %hostname, "Waiting for validator to be detected");

    let result = poll_until(policy, "wait for validator", || async {
        let lookup = locate_validator(metrics, query)
            .await
            .map_err(|source| FailoverError::Gateway {
                operation: "query validator metric",
                source,
            })?;

        Ok::<_, FailoverError>(match lookup {
            ValidatorLookup::Found(validator) if validator.hostname == hostname => {
                ControlFlow::Break(validator)
            }
            other => ControlFlow::Continue(other),
        })
    })
    .await?;

    match result {
        PollResult::Ready { value, attempts } => {
            info!(
                hostname = %value.hostname,
                scale_set = %value.scale_set_name,
                attempts = attempts,
                "Validator detected"
            );
            Ok(value)
        }
        PollResult::Exhausted { last, attempts } => {
            warn!(
                hostname = %hostname,
                last_seen = ?last.validator().map(|v| &v.hostname),
                attempts = attempts,
                "Validator was not detected in time"
            );
            Err(FailoverError::ValidatorWaitTimeout {
                hostname: hostname.to_string(),
                attempts,
            })
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod validator_tests;
