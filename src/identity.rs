// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Failover identity encoding.
//!
//! The identity stored in `status.id` carries enough of the spec to rebuild it
//! without reading the live object, so a pass can always tell which cluster
//! its persisted state belongs to.
//!
//! # Format
//!
//! ```text
//! fo1.<base64url(json payload), no padding>
//! ```
//!
//! The `fo1` tag versions the payload. Decoding rejects any other tag.

use crate::constants::IDENTITY_PREFIX;
use crate::crd::{FailoverMode, ValidatorFailoverSpec};
use crate::failover_errors::IdentityError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64, Engine};
use serde::{Deserialize, Serialize};

/// Spec fields carried by the identity.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityPayload {
    prefix: String,
    resource_group: String,
    mode: FailoverMode,
    locations: Vec<String>,
    #[serde(default)]
    instances: Vec<i32>,
    metric_name: String,
    metric_namespace: String,
}

/// Encode the identity of a failover spec.
///
/// # Errors
///
/// Returns [`IdentityError::EncodeFailed`] if the payload cannot be serialized.
pub fn encode_identity(spec: &ValidatorFailoverSpec) -> Result<String, IdentityError> {
    let payload = IdentityPayload {
        prefix: spec.prefix.clone(),
        resource_group: spec.resource_group.clone(),
        mode: spec.failover_mode,
        locations: spec.locations.clone(),
        instances: spec.instances.clone(),
        metric_name: spec.metric_name.clone(),
        metric_namespace: spec.metric_namespace.clone(),
    };

    let json = serde_json::to_vec(&payload).map_err(|e| IdentityError::EncodeFailed {
        reason: e.to_string(),
    })?;

    Ok(format!("{IDENTITY_PREFIX}.{}", BASE64.encode(json)))
}

/// Decode an identity back into the spec it was created from.
///
/// Fields the identity does not carry (`deleteVmsWithApiInSingleMode`) are left unset.
///
/// # Errors
///
/// - [`IdentityError::UnsupportedFormat`] when the version tag is missing or unknown
/// - [`IdentityError::InvalidEncoding`] when the body is not base64url
/// - [`IdentityError::InvalidPayload`] when the decoded body is not a valid payload
pub fn decode_identity(id: &str) -> Result<ValidatorFailoverSpec, IdentityError> {
    let body = id
        .split_once('.')
        .filter(|(tag, _)| *tag == IDENTITY_PREFIX)
        .map(|(_, body)| body)
        .ok_or_else(|| IdentityError::UnsupportedFormat {
            id: id.to_string(),
            expected: IDENTITY_PREFIX.to_string(),
        })?;

    let json = BASE64
        .decode(body)
        .map_err(|e| IdentityError::InvalidEncoding {
            id: id.to_string(),
            reason: e.to_string(),
        })?;

    let payload: IdentityPayload =
        serde_json::from_slice(&json).map_err(|e| IdentityError::InvalidPayload {
            id: id.to_string(),
            reason: e.to_string(),
        })?;

    Ok(ValidatorFailoverSpec {
        prefix: payload.prefix,
        resource_group: payload.resource_group,
        locations: payload.locations,
        failover_mode: payload.mode,
        instances: payload.instances,
        metric_name: payload.metric_name,
        metric_namespace: payload.metric_namespace,
        delete_vms_with_api_in_single_mode: None,
    })
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod identity_tests;
