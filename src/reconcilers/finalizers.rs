// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management for namespaced custom resources.
//!
//! # Example
//!
//! ```rust,ignore
//! use validator_failover::reconcilers::finalizers::{ensure_finalizer, handle_deletion};
//!
//! if failover.metadata.deletion_timestamp.is_some() {
//!     return handle_deletion(&client, &failover, FINALIZER).await;
//! }
//! ensure_finalizer(&client, &failover, FINALIZER).await?;
//! ```

use anyhow::Result;
use kube::api::{Patch, PatchParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use serde_json::json;
use tracing::{debug, info};

/// Cleanup that must complete before a resource's finalizer is removed.
#[async_trait::async_trait]
pub trait FinalizerCleanup: Resource + ResourceExt + Clone {
    /// Release whatever the resource still holds.
    ///
    /// # Errors
    ///
    /// An error keeps the finalizer in place, so deletion stays blocked until a
    /// later reconciliation succeeds.
    async fn cleanup(&self, client: &Client) -> Result<()>;
}

/// Whether `resource` carries `finalizer`.
pub fn has_finalizer<T: Resource>(resource: &T, finalizer: &str) -> bool {
    resource
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|existing| existing == finalizer))
}

/// The finalizer list of `resource` with `finalizer` appended, or `None` if already present.
pub fn finalizers_with<T: Resource>(resource: &T, finalizer: &str) -> Option<Vec<String>> {
    if has_finalizer(resource, finalizer) {
        return None;
    }
    let mut finalizers = resource.meta().finalizers.clone().unwrap_or_default();
    finalizers.push(finalizer.to_string());
    Some(finalizers)
}

/// The finalizer list of `resource` without `finalizer`, or `None` if it was absent.
pub fn finalizers_without<T: Resource>(resource: &T, finalizer: &str) -> Option<Vec<String>> {
    if !has_finalizer(resource, finalizer) {
        return None;
    }
    let mut finalizers = resource.meta().finalizers.clone().unwrap_or_default();
    finalizers.retain(|f| f != finalizer);
    Some(finalizers)
}

async fn patch_finalizers<T>(client: &Client, resource: &T, finalizers: Vec<String>) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + ResourceExt
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let namespace = resource.namespace().unwrap_or_default();
    let api: Api<T> = Api::namespaced(client.clone(), &namespace);
    let patch = json!({ "metadata": { "finalizers": finalizers } });
    api.patch(
        &resource.name_any(),
        &PatchParams::default(),
        &Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}

/// Add `finalizer` to `resource` unless it is already present.
///
/// # Errors
///
/// Returns an error if the API patch fails.
pub async fn ensure_finalizer<T>(client: &Client, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + ResourceExt
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let Some(finalizers) = finalizers_with(resource, finalizer) else {
        return Ok(());
    };

    info!(
        "Adding finalizer {} to {}/{} {}",
        finalizer,
        resource.namespace().unwrap_or_default(),
        resource.name_any(),
        T::kind(&())
    );
    patch_finalizers(client, resource, finalizers).await
}

/// Remove `finalizer` from `resource` if present.
///
/// # Errors
///
/// Returns an error if the API patch fails.
pub async fn remove_finalizer<T>(client: &Client, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + ResourceExt
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    let Some(finalizers) = finalizers_without(resource, finalizer) else {
        return Ok(());
    };

    info!(
        "Removing finalizer {} from {}/{} {}",
        finalizer,
        resource.namespace().unwrap_or_default(),
        resource.name_any(),
        T::kind(&())
    );
    patch_finalizers(client, resource, finalizers).await
}

/// Run the resource's cleanup, then release its finalizer.
///
/// Does nothing when the finalizer is already gone.
///
/// # Errors
///
/// Returns an error if cleanup or the finalizer patch fails. The finalizer then
/// stays in place and deletion is retried on the next reconciliation.
pub async fn handle_deletion<T>(client: &Client, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + ResourceExt
        + FinalizerCleanup
        + Clone
        + std::fmt::Debug
        + serde::Serialize
        + for<'de> serde::Deserialize<'de>,
{
    info!(
        "{} {}/{} is being deleted",
        T::kind(&()),
        resource.namespace().unwrap_or_default(),
        resource.name_any()
    );

    if !has_finalizer(resource, finalizer) {
        debug!("Finalizer {} already removed", finalizer);
        return Ok(());
    }

    resource.cleanup(client).await?;
    remove_finalizer(client, resource, finalizer).await
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
