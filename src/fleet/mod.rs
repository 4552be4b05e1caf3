// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Fleet gateway collaborators.
//!
//! The reconciliation core never talks to a cloud SDK directly. It consumes three
//! narrow interfaces:
//!
//! - [`MetricsGateway`] - aggregated metric samples per scale set and instance
//! - [`TopologyEnumerator`] - scale sets and their member instances
//! - [`InstanceMutator`] - deletion of scale-set instances
//!
//! [`http::FleetApiClient`] implements all three against the fleet gateway HTTP API.
//! Tests substitute in-memory implementations.
//!
//! ## Module Structure
//!
//! - [`types`] - Data exchanged with the gateway
//! - [`http`] - `reqwest` adapter for the fleet gateway

pub mod http;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use http::FleetApiClient;
pub use types::{
    Aggregation, MetricQuery, MetricSample, Validator, ValidatorLookup, VmInstance, VmInventory,
};

use crate::failover_errors::GatewayError;
use std::sync::Arc;

/// Source of aggregated telemetry samples.
#[async_trait::async_trait]
pub trait MetricsGateway: Send + Sync {
    /// Return one aggregated sample per scale set and instance over `query.window`.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] when the gateway cannot be queried.
    async fn query(&self, query: &MetricQuery) -> Result<Vec<MetricSample>, GatewayError>;
}

/// Enumerates the scale sets of a cluster and their instances.
#[async_trait::async_trait]
pub trait TopologyEnumerator: Send + Sync {
    /// List scale sets in `resource_group` whose name starts with `prefix`.
    ///
    /// The returned order is preserved by callers and drives validator tie-breaking.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] when the gateway cannot be queried.
    async fn list_scale_sets(
        &self,
        resource_group: &str,
        prefix: &str,
    ) -> Result<Vec<String>, GatewayError>;

    /// List every instance of every scale set matching `prefix`.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] when the gateway cannot be queried.
    async fn list_instances(
        &self,
        prefix: &str,
        resource_group: &str,
    ) -> Result<VmInventory, GatewayError>;
}

/// Mutates scale-set membership.
#[async_trait::async_trait]
pub trait InstanceMutator: Send + Sync {
    /// Delete `instance_ids` from `scale_set_name`.
    ///
    /// When `adjust_capacity` is set the scale set capacity shrinks in the same
    /// call, so the provider does not replace the deleted instances.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] when the deletion request is rejected.
    async fn delete_instances(
        &self,
        resource_group: &str,
        scale_set_name: &str,
        instance_ids: &[String],
        adjust_capacity: bool,
    ) -> Result<(), GatewayError>;
}

/// The collaborators a reconciliation pass needs, bundled for the [`crate::context::Context`].
#[derive(Clone)]
pub struct FleetClients {
    pub metrics: Arc<dyn MetricsGateway>,
    pub topology: Arc<dyn TopologyEnumerator>,
    pub mutator: Arc<dyn InstanceMutator>,
}

impl FleetClients {
    /// Use a single client implementing all three interfaces.
    pub fn from_client<C>(client: Arc<C>) -> Self
    where
        C: MetricsGateway + TopologyEnumerator + InstanceMutator + 'static,
    {
        Self {
            metrics: client.clone(),
            topology: client.clone(),
            mutator: client,
        }
    }
}

impl std::fmt::Debug for FleetClients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetClients").finish_non_exhaustive()
    }
}
