// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Fixed-interval polling with an explicit attempt bound.
//!
//! Convergence waits poll the fleet at a fixed interval rather than backing off:
//! the provider settles on its own schedule and the wait is already bounded by the
//! operation deadline. Exhausting the attempt bound is reported to the caller as
//! [`PollResult::Exhausted`], which callers turn into their own timeout error.

use crate::constants::{DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POLL_MAX_ATTEMPTS};
use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tracing::debug;

/// Interval and bound of a poll loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between two attempts
    pub interval: Duration,
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
}

impl PollPolicy {
    #[must_use]
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// A policy that never sleeps between attempts.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self::new(Duration::ZERO, max_attempts)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            DEFAULT_POLL_MAX_ATTEMPTS,
        )
    }
}

/// Result of a bounded poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollResult<T, O> {
    /// The condition was met
    Ready {
        /// Value produced by the successful check
        value: T,
        /// Attempts performed, including the successful one
        attempts: u32,
    },
    /// The attempt bound was exhausted
    Exhausted {
        /// Observation of the final attempt
        last: O,
        /// Attempts performed
        attempts: u32,
    },
}

/// Poll `check` until it breaks or the attempt bound is exhausted.
///
/// `check` is called immediately, then once per `policy.interval`. It returns
/// `ControlFlow::Break(value)` when the awaited condition holds and
/// `ControlFlow::Continue(observation)` otherwise. No sleep follows the final attempt.
///
/// A zero `max_attempts` is treated as one attempt.
///
/// # Arguments
///
/// * `policy` - Interval and attempt bound
/// * `operation_name` - Human-readable name for logging (e.g., "wait for instance count")
/// * `check` - One poll attempt
///
/// # Errors
///
/// Returns the first error produced by `check`. Errors are never retried.
pub async fn poll_until<T, O, E, F, Fut>(
    policy: &PollPolicy,
    operation_name: &str,
    mut check: F,
) -> Result<PollResult<T, O>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ControlFlow<T, O>, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match check().await? {
            ControlFlow::Break(value) => {
                debug!(
                    operation = operation_name,
                    attempt = attempt,
                    "Poll condition met"
                );
                return Ok(PollResult::Ready {
                    value,
                    attempts: attempt,
                });
            }
            ControlFlow::Continue(last) => {
                if attempt >= max_attempts {
                    debug!(
                        operation = operation_name,
                        attempts = attempt,
                        "Poll attempts exhausted"
                    );
                    return Ok(PollResult::Exhausted {
                        last,
                        attempts: attempt,
                    });
                }

                debug!(
                    operation = operation_name,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    retry_after = ?policy.interval,
                    "Poll condition not met yet"
                );
                tokio::time::sleep(policy.interval).await;
            }
        }
    }
}

#[cfg(test)]
#[path = "poll_tests.rs"]
mod poll_tests;
