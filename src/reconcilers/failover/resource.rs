// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Create/Read/Delete state machine of a failover resource.
//!
//! Each operation takes the persisted [`FailoverResource`] by reference and
//! returns a freshly built one. Nothing is written back on failure, so the
//! caller only ever commits a complete count matrix.
//!
//! Create/Update and Read run under separate operation-wide deadlines taken from
//! [`FailoverSettings`]. Create chains into Read inside its own deadline.

use super::convergence::{converge, ConvergenceReport, ConvergenceRequest};
use super::counts::{build_counts, fill_default_counts, CountSource};
use super::location::resolve_location_index;
use super::validation::validate_spec;
use super::validator::{locate_validator, validator_query};
use crate::config::FailoverSettings;
use crate::crd::ValidatorFailoverSpec;
use crate::failover_errors::{FailoverError, GatewayError};
use crate::fleet::{FleetClients, MetricQuery, ValidatorLookup, VmInventory};
use crate::identity::{decode_identity, encode_identity};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Persisted state of one failover resource.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FailoverResource {
    /// Failover identity, `None` until the first successful Create
    pub id: Option<String>,
    /// Desired configuration, when the schema is available
    pub spec: Option<ValidatorFailoverSpec>,
    /// Count matrix aligned with `spec.locations`
    pub failover_instances: Vec<i32>,
}

impl FailoverResource {
    /// Whether the resource has been created.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.id.is_some()
    }

    /// Resolve the spec from the schema, falling back to the decoded identity.
    ///
    /// A present identity is always decoded, so a corrupted identity is reported
    /// even while the schema is available.
    ///
    /// # Errors
    ///
    /// - [`FailoverError::IdentityDecode`] when the identity is malformed
    /// - [`FailoverError::InvalidSpec`] when neither source is available
    pub fn load_spec(&self) -> Result<ValidatorFailoverSpec, FailoverError> {
        let decoded = self.id.as_deref().map(decode_identity).transpose()?;

        self.spec
            .clone()
            .or(decoded)
            .ok_or_else(|| FailoverError::InvalidSpec {
                reason: "neither a spec nor an identity is available".to_string(),
            })
    }
}

/// Result of a successful operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailoverOutcome {
    /// State to commit
    pub resource: FailoverResource,
    /// Validator observed by the final Read, `None` in distributed mode or when cleared
    pub validator: Option<ValidatorLookup>,
    /// Scale sets listed by the final Read, in gateway order
    pub scale_sets: Vec<String>,
    /// Convergence run performed by Create/Update, if any
    pub convergence: Option<ConvergenceReport>,
}

impl FailoverOutcome {
    fn cleared(resource: &FailoverResource) -> Self {
        Self {
            resource: FailoverResource {
                id: None,
                spec: resource.spec.clone(),
                failover_instances: Vec::new(),
            },
            validator: None,
            scale_sets: Vec::new(),
            convergence: None,
        }
    }
}

/// Single-mode discovery performed at the start of a pass.
struct Discovery {
    query: MetricQuery,
    validator: ValidatorLookup,
    inventory: VmInventory,
}

fn gateway(operation: &'static str) -> impl FnOnce(GatewayError) -> FailoverError {
    move |source| FailoverError::Gateway { operation, source }
}

async fn with_deadline<T, F>(
    operation: &'static str,
    timeout: Duration,
    future: F,
) -> Result<T, FailoverError>
where
    F: Future<Output = Result<T, FailoverError>>,
{
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| {
            warn!(operation = operation, timeout = ?timeout, "Operation deadline exceeded");
            FailoverError::DeadlineExceeded { operation, timeout }
        })?
}

/// Runs the failover operations against a fleet.
pub struct FailoverEngine<'a> {
    fleet: &'a FleetClients,
    settings: &'a FailoverSettings,
}

impl<'a> FailoverEngine<'a> {
    #[must_use]
    pub fn new(fleet: &'a FleetClients, settings: &'a FailoverSettings) -> Self {
        Self { fleet, settings }
    }

    /// Create or update the resource, then Read it back.
    ///
    /// In distributed mode no remote call is made. In single mode the validator
    /// is located, standby instances are pruned when pruning is enabled, and the
    /// count matrix is derived from the validator's location.
    ///
    /// # Errors
    ///
    /// Returns the first validation, identity, gateway, convergence or deadline
    /// failure. `resource` is never modified.
    pub async fn create_or_update(
        &self,
        resource: &FailoverResource,
    ) -> Result<FailoverOutcome, FailoverError> {
        with_deadline("create", self.settings.create_timeout, async {
            let staged = resource.clone();
            let (created, convergence) = self.create_pass(staged).await?;
            let mut outcome = self.read_pass(&created).await?;
            outcome.convergence = convergence;
            Ok(outcome)
        })
        .await
    }

    /// Refresh the count matrix from the live fleet.
    ///
    /// An uninitialized resource is returned cleared without any remote call.
    ///
    /// # Errors
    ///
    /// Returns the first validation, identity, gateway or deadline failure.
    /// `resource` is never modified.
    pub async fn read(
        &self,
        resource: &FailoverResource,
    ) -> Result<FailoverOutcome, FailoverError> {
        with_deadline("read", self.settings.read_timeout, self.read_pass(resource)).await
    }

    /// Forget the resource. Fleet teardown belongs to the provisioning layer.
    #[must_use]
    pub fn delete(&self, resource: &FailoverResource) -> FailoverResource {
        info!(id = ?resource.id, "Clearing failover state");
        FailoverResource::default()
    }

    async fn list_scale_sets(
        &self,
        spec: &ValidatorFailoverSpec,
    ) -> Result<Vec<String>, FailoverError> {
        let scale_sets = self
            .fleet
            .topology
            .list_scale_sets(&spec.resource_group, &spec.prefix)
            .await
            .map_err(gateway("list scale sets"))?;
        debug!(prefix = %spec.prefix, scale_sets = ?scale_sets, "Listed scale sets");
        Ok(scale_sets)
    }

    async fn discover(
        &self,
        spec: &ValidatorFailoverSpec,
        scale_sets: &[String],
    ) -> Result<Discovery, FailoverError> {
        let query = validator_query(spec, scale_sets, self.settings.metric_window);
        let validator = locate_validator(self.fleet.metrics.as_ref(), &query)
            .await
            .map_err(gateway("query validator metric"))?;

        let inventory = self
            .fleet
            .topology
            .list_instances(&spec.prefix, &spec.resource_group)
            .await
            .map_err(gateway("list instances"))?;
        debug!(instances = inventory.size(), "Listed instances");

        Ok(Discovery {
            query,
            validator,
            inventory,
        })
    }

    async fn create_pass(
        &self,
        mut staged: FailoverResource,
    ) -> Result<(FailoverResource, Option<ConvergenceReport>), FailoverError> {
        let spec = staged.load_spec()?;
        validate_spec(&spec)?;
        let num_locations = spec.locations.len();
        let mut convergence = None;

        let counts = if spec.is_distributed_mode() {
            debug!(prefix = %spec.prefix, "Distributed mode, using configured counts");
            build_counts(CountSource::Distributed(&spec.instances), num_locations)
        } else {
            let scale_sets = self.list_scale_sets(&spec).await?;

            if scale_sets.is_empty() {
                info!(prefix = %spec.prefix, "No scale sets yet, bootstrapping");
                build_counts(CountSource::Single(None), num_locations)
            } else {
                let Discovery {
                    query,
                    validator,
                    inventory,
                } = self.discover(&spec, &scale_sets).await?;

                if self.settings.prune_enabled(&spec) {
                    let report = converge(
                        self.fleet,
                        self.settings,
                        &ConvergenceRequest {
                            resource_group: &spec.resource_group,
                            prefix: &spec.prefix,
                            validator: &validator,
                            inventory: &inventory,
                            validator_query: &query,
                        },
                    )
                    .await?;
                    convergence = Some(report);
                }

                // The validator's instance survives pruning, so the snapshot still locates it
                let index = resolve_location_index(
                    &inventory,
                    &spec.locations,
                    validator.scale_set_name(),
                );
                build_counts(CountSource::Single(index), num_locations)
            }
        };

        staged.failover_instances = fill_default_counts(counts, &spec);
        staged.id = Some(encode_identity(&spec).map_err(FailoverError::IdentityEncode)?);
        staged.spec = Some(spec);

        info!(
            id = ?staged.id,
            counts = ?staged.failover_instances,
            "Failover resource created"
        );
        Ok((staged, convergence))
    }

    async fn read_pass(
        &self,
        resource: &FailoverResource,
    ) -> Result<FailoverOutcome, FailoverError> {
        if !resource.is_initialized() {
            debug!("Failover resource is not initialized, clearing state");
            return Ok(FailoverOutcome::cleared(resource));
        }

        let spec = resource.load_spec()?;
        validate_spec(&spec)?;
        let num_locations = spec.locations.len();

        let (counts, validator, scale_sets) = if spec.is_distributed_mode() {
            (
                build_counts(CountSource::Distributed(&spec.instances), num_locations),
                None,
                Vec::new(),
            )
        } else {
            let scale_sets = self.list_scale_sets(&spec).await?;
            let discovery = self.discover(&spec, &scale_sets).await?;
            let index = resolve_location_index(
                &discovery.inventory,
                &spec.locations,
                discovery.validator.scale_set_name(),
            );
            if index.is_none() {
                debug!(
                    scale_sets = scale_sets.len(),
                    "Validator location unresolved, defaulting to the first location"
                );
            }
            (
                build_counts(CountSource::Single(Some(index.unwrap_or(0))), num_locations),
                Some(discovery.validator),
                scale_sets,
            )
        };

        let failover_instances = fill_default_counts(counts, &spec);
        debug!(counts = ?failover_instances, "Read count matrix");

        Ok(FailoverOutcome {
            resource: FailoverResource {
                id: resource.id.clone(),
                spec: Some(spec),
                failover_instances,
            },
            validator,
            scale_sets,
            convergence: None,
        })
    }
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod resource_tests;
