// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory fleet used by unit tests.
//!
//! `FakeFleet` implements every fleet collaborator over a shared in-memory
//! inventory and records each call. Deletions remove instances from the
//! inventory unless the fleet is frozen, which lets tests simulate a provider
//! that never converges.

use super::types::{MetricQuery, MetricSample, VmInstance, VmInventory};
use super::{FleetClients, InstanceMutator, MetricsGateway, TopologyEnumerator};
use crate::failover_errors::GatewayError;
use chrono::Utc;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// One recorded `delete_instances` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct DeleteCall {
    pub scale_set_name: String,
    pub instance_ids: Vec<String>,
    pub adjust_capacity: bool,
}

#[derive(Default)]
struct FakeState {
    scale_sets: Vec<String>,
    inventory: BTreeMap<String, Vec<VmInstance>>,
    validator_hostname: Option<String>,
    scripted_samples: VecDeque<Vec<MetricSample>>,
    frozen: bool,
    metrics_error: Option<GatewayError>,
    topology_error: Option<GatewayError>,
    delete_error: Option<GatewayError>,
    metric_queries: Vec<MetricQuery>,
    scale_set_lists: usize,
    instance_lists: usize,
    deletions: Vec<DeleteCall>,
}

/// In-memory implementation of the fleet collaborators.
#[derive(Default)]
pub(crate) struct FakeFleet {
    state: Mutex<FakeState>,
}

pub(crate) fn vm(instance_id: &str, hostname: &str, location: &str) -> VmInstance {
    VmInstance {
        instance_id: instance_id.to_string(),
        hostname: hostname.to_string(),
        location: location.to_string(),
    }
}

pub(crate) fn sample(scale_set_name: &str, hostname: &str, value: f64) -> MetricSample {
    MetricSample {
        scale_set_name: scale_set_name.to_string(),
        hostname: hostname.to_string(),
        value,
        timestamp: Utc::now(),
    }
}

impl FakeFleet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Add a scale set. Listing order follows insertion order.
    pub fn with_scale_set(self, name: &str, instances: Vec<VmInstance>) -> Self {
        {
            let mut state = self.lock();
            state.scale_sets.push(name.to_string());
            state.inventory.insert(name.to_string(), instances);
        }
        self
    }

    /// Report `value = 1` for `hostname` while it is in the inventory, `0` for everyone else.
    pub fn with_validator(self, hostname: &str) -> Self {
        self.lock().validator_hostname = Some(hostname.to_string());
        self
    }

    /// Return `samples` from the next metrics query, before falling back to
    /// inventory-derived samples.
    pub fn with_scripted_samples(self, samples: Vec<MetricSample>) -> Self {
        self.lock().scripted_samples.push_back(samples);
        self
    }

    /// Acknowledge deletions without removing anything from the inventory.
    pub fn frozen(self) -> Self {
        self.lock().frozen = true;
        self
    }

    pub fn with_metrics_error(self, error: GatewayError) -> Self {
        self.lock().metrics_error = Some(error);
        self
    }

    pub fn with_topology_error(self, error: GatewayError) -> Self {
        self.lock().topology_error = Some(error);
        self
    }

    pub fn with_delete_error(self, error: GatewayError) -> Self {
        self.lock().delete_error = Some(error);
        self
    }

    /// Bundle this fake as the three collaborators.
    pub fn into_clients(self) -> (Arc<Self>, FleetClients) {
        let fleet = Arc::new(self);
        let clients = FleetClients::from_client(fleet.clone());
        (fleet, clients)
    }

    pub fn set_validator(&self, hostname: Option<&str>) {
        self.lock().validator_hostname = hostname.map(str::to_string);
    }

    pub fn metric_queries(&self) -> Vec<MetricQuery> {
        self.lock().metric_queries.clone()
    }

    pub fn metric_query_count(&self) -> usize {
        self.lock().metric_queries.len()
    }

    pub fn scale_set_list_count(&self) -> usize {
        self.lock().scale_set_lists
    }

    pub fn instance_list_count(&self) -> usize {
        self.lock().instance_lists
    }

    pub fn deletions(&self) -> Vec<DeleteCall> {
        self.lock().deletions.clone()
    }

    /// Every collaborator invocation of any kind.
    pub fn total_calls(&self) -> usize {
        let state = self.lock();
        state.metric_queries.len()
            + state.scale_set_lists
            + state.instance_lists
            + state.deletions.len()
    }

    pub fn remaining_hostnames(&self) -> Vec<String> {
        self.lock()
            .inventory
            .values()
            .flatten()
            .map(|vm| vm.hostname.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl MetricsGateway for FakeFleet {
    async fn query(&self, query: &MetricQuery) -> Result<Vec<MetricSample>, GatewayError> {
        let mut state = self.lock();
        state.metric_queries.push(query.clone());
        if let Some(err) = &state.metrics_error {
            return Err(err.clone());
        }
        if let Some(samples) = state.scripted_samples.pop_front() {
            return Ok(samples);
        }

        let validator = state.validator_hostname.clone().unwrap_or_default();
        let mut samples = Vec::new();
        for name in &query.scale_set_names {
            for vm in state.inventory.get(name).into_iter().flatten() {
                let value = if vm.hostname == validator { 1.0 } else { 0.0 };
                samples.push(sample(name, &vm.hostname, value));
            }
        }
        Ok(samples)
    }
}

#[async_trait::async_trait]
impl TopologyEnumerator for FakeFleet {
    async fn list_scale_sets(
        &self,
        _resource_group: &str,
        prefix: &str,
    ) -> Result<Vec<String>, GatewayError> {
        let mut state = self.lock();
        state.scale_set_lists += 1;
        if let Some(err) = &state.topology_error {
            return Err(err.clone());
        }
        Ok(state
            .scale_sets
            .iter()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn list_instances(
        &self,
        prefix: &str,
        _resource_group: &str,
    ) -> Result<VmInventory, GatewayError> {
        let mut state = self.lock();
        state.instance_lists += 1;
        if let Some(err) = &state.topology_error {
            return Err(err.clone());
        }
        Ok(state
            .inventory
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, vms)| (name.clone(), vms.clone()))
            .collect())
    }
}

#[async_trait::async_trait]
impl InstanceMutator for FakeFleet {
    async fn delete_instances(
        &self,
        _resource_group: &str,
        scale_set_name: &str,
        instance_ids: &[String],
        adjust_capacity: bool,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        state.deletions.push(DeleteCall {
            scale_set_name: scale_set_name.to_string(),
            instance_ids: instance_ids.to_vec(),
            adjust_capacity,
        });
        if let Some(err) = &state.delete_error {
            return Err(err.clone());
        }
        if !state.frozen {
            if let Some(vms) = state.inventory.get_mut(scale_set_name) {
                vms.retain(|vm| !instance_ids.contains(&vm.instance_id));
            }
        }
        Ok(())
    }
}
