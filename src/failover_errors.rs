// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Failover reconciliation and fleet gateway error types.
//!
//! This module provides specialized error types for:
//! - Fleet gateway operations (metrics queries, scale-set enumeration, instance deletion)
//! - Failover identity encoding and decoding
//! - Reconciliation failures (convergence timeouts, deadlines, invalid specs)
//!
//! A missing validator is deliberately not an error: it is reported as
//! [`crate::fleet::ValidatorLookup::NotFound`] and the pass continues.

use crate::status_reasons::{
    REASON_CONVERGENCE_TIMEOUT, REASON_DEADLINE_EXCEEDED, REASON_GATEWAY_ERROR,
    REASON_GATEWAY_UNAUTHORIZED, REASON_IDENTITY_DECODE_FAILED, REASON_IDENTITY_ENCODE_FAILED,
    REASON_INSTANCE_DELETION_FAILED, REASON_INVALID_SPEC, REASON_VALIDATOR_WAIT_TIMEOUT,
};
use std::time::Duration;
use thiserror::Error;

/// Errors returned by the fleet gateway collaborators.
///
/// These represent failures talking to the metrics, topology or mutation APIs.
/// They are fatal to the current reconciliation pass and are never retried
/// internally; the next pass starts again from live state.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// The gateway rejected the credentials (HTTP 401/403)
    #[error("Fleet gateway at {endpoint} rejected the request (HTTP {status_code}): {message}")]
    Unauthorized {
        /// The endpoint that rejected the request
        endpoint: String,
        /// HTTP status code (401 or 403)
        status_code: u16,
        /// Response body returned by the gateway
        message: String,
    },

    /// The gateway answered with an unexpected HTTP status
    #[error("Fleet gateway at {endpoint} returned HTTP {status_code}: {message}")]
    Http {
        /// The endpoint that returned the error
        endpoint: String,
        /// HTTP status code
        status_code: u16,
        /// Response body returned by the gateway
        message: String,
    },

    /// The request never reached the gateway (DNS, refused connection, TLS, timeout)
    #[error("Connection to fleet gateway at {endpoint} failed: {reason}")]
    Connection {
        /// The endpoint that couldn't be reached
        endpoint: String,
        /// Reason for the connection failure
        reason: String,
    },

    /// The gateway answered 2xx with a body that could not be decoded
    #[error("Malformed response from fleet gateway at {endpoint}: {reason}")]
    MalformedResponse {
        /// The endpoint that returned the body
        endpoint: String,
        /// Decoder error
        reason: String,
    },

    /// The configured gateway URL cannot be used to build a request
    #[error("Invalid fleet gateway endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// The offending base URL
        endpoint: String,
        /// Why the URL was rejected
        reason: String,
    },
}

/// Errors raised while encoding or decoding a failover identity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The identity does not start with the expected version tag
    #[error("Failover identity '{id}' has an unsupported format (expected prefix '{expected}.')")]
    UnsupportedFormat {
        /// The identity that was rejected
        id: String,
        /// The version tag that was expected
        expected: String,
    },

    /// The identity body is not valid base64
    #[error("Failover identity '{id}' is not valid base64: {reason}")]
    InvalidEncoding {
        /// The identity that was rejected
        id: String,
        /// Decoder error
        reason: String,
    },

    /// The decoded identity body is not a valid payload
    #[error("Failover identity '{id}' has an invalid payload: {reason}")]
    InvalidPayload {
        /// The identity that was rejected
        id: String,
        /// Deserializer error
        reason: String,
    },

    /// The payload could not be serialized
    #[error("Failed to encode failover identity: {reason}")]
    EncodeFailed {
        /// Serializer error
        reason: String,
    },
}

/// Errors that abort a failover reconciliation pass.
///
/// Every variant is fatal for the current pass. The persisted state is left
/// untouched and the controller requeues the object, so repeated passes heal
/// partially applied changes.
#[derive(Error, Debug)]
pub enum FailoverError {
    /// A metrics or topology read failed
    #[error("Failed to {operation}: {source}")]
    Gateway {
        /// What the pass was doing (e.g. "list scale sets")
        operation: &'static str,
        /// The underlying gateway failure
        #[source]
        source: GatewayError,
    },

    /// Deleting standby instances from a scale set failed
    #[error("Failed to delete {instance_count} instance(s) from scale set '{scale_set}': {source}")]
    InstanceDeletion {
        /// Scale set whose instances were being deleted
        scale_set: String,
        /// Number of instances in the failed request
        instance_count: usize,
        /// The underlying gateway failure
        #[source]
        source: GatewayError,
    },

    /// The live instance count never reached the expected value within the poll budget
    #[error("Instance count did not converge to {expected} after {attempts} attempt(s) (last observed {observed})")]
    ConvergenceTimeout {
        /// Instance count that was waited for
        expected: usize,
        /// Instance count seen on the final attempt
        observed: usize,
        /// Number of poll attempts performed
        attempts: u32,
    },

    /// The validator was not re-detected within the poll budget
    #[error("Validator was not detected on host '{hostname}' after {attempts} attempt(s)")]
    ValidatorWaitTimeout {
        /// Host expected to carry the validator role
        hostname: String,
        /// Number of poll attempts performed
        attempts: u32,
    },

    /// The persisted identity could not be decoded
    #[error(transparent)]
    IdentityDecode(#[from] IdentityError),

    /// The identity of a freshly created resource could not be encoded
    #[error("Failed to assign failover identity: {0}")]
    IdentityEncode(#[source] IdentityError),

    /// The spec violates a structural invariant
    #[error("Invalid failover spec: {reason}")]
    InvalidSpec {
        /// Explanation of what is invalid
        reason: String,
    },

    /// The operation-wide deadline elapsed before the pass finished
    #[error("{operation} did not finish within {}s", timeout.as_secs())]
    DeadlineExceeded {
        /// Which operation ran out of time ("create" or "read")
        operation: &'static str,
        /// The deadline that elapsed
        timeout: Duration,
    },
}

impl FailoverError {
    /// Status condition reason describing this error.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Gateway {
                source: GatewayError::Unauthorized { .. },
                ..
            } => REASON_GATEWAY_UNAUTHORIZED,
            Self::Gateway { .. } => REASON_GATEWAY_ERROR,
            Self::InstanceDeletion { .. } => REASON_INSTANCE_DELETION_FAILED,
            Self::ConvergenceTimeout { .. } => REASON_CONVERGENCE_TIMEOUT,
            Self::ValidatorWaitTimeout { .. } => REASON_VALIDATOR_WAIT_TIMEOUT,
            Self::IdentityDecode(_) => REASON_IDENTITY_DECODE_FAILED,
            Self::IdentityEncode(_) => REASON_IDENTITY_ENCODE_FAILED,
            Self::InvalidSpec { .. } => REASON_INVALID_SPEC,
            Self::DeadlineExceeded { .. } => REASON_DEADLINE_EXCEEDED,
        }
    }

    /// Error category used as the `error_type` metrics label.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Gateway { .. } | Self::InstanceDeletion { .. } => "gateway_error",
            Self::ConvergenceTimeout { .. } | Self::ValidatorWaitTimeout { .. } => "timeout",
            Self::DeadlineExceeded { .. } => "deadline",
            Self::IdentityDecode(_) | Self::InvalidSpec { .. } => "validation_error",
            Self::IdentityEncode(_) => "identity_error",
        }
    }

    /// Whether the error came from a bounded poll running out of attempts.
    #[must_use]
    pub fn is_poll_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConvergenceTimeout { .. } | Self::ValidatorWaitTimeout { .. }
        )
    }
}

#[cfg(test)]
#[path = "failover_errors_tests.rs"]
mod failover_errors_tests;
