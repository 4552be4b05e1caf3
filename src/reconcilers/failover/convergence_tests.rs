// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tests for the convergence protocol.

#[cfg(test)]
mod tests {
    use crate::config::FailoverSettings;
    use crate::crd::{FailoverMode, ValidatorFailoverSpec};
    use crate::failover_errors::{FailoverError, GatewayError};
    use crate::fleet::fake::{vm, FakeFleet};
    use crate::fleet::{Validator, ValidatorLookup, VmInventory};
    use crate::reconcilers::failover::convergence::{
        converge, wait_for_instance_count, ConvergenceReport, ConvergenceRequest,
    };
    use crate::reconcilers::failover::poll::PollPolicy;
    use crate::reconcilers::failover::validator::validator_query;
    use std::time::Duration;

    const RG: &str = "validators";

    fn spec() -> ValidatorFailoverSpec {
        ValidatorFailoverSpec {
            prefix: "dot".to_string(),
            resource_group: RG.to_string(),
            locations: vec![
                "eastus".to_string(),
                "westeurope".to_string(),
                "centralus".to_string(),
            ],
            failover_mode: FailoverMode::Single,
            instances: vec![],
            metric_name: "validator_value".to_string(),
            metric_namespace: "polkadot".to_string(),
            delete_vms_with_api_in_single_mode: Some(true),
        }
    }

    fn settings(max_attempts: u32) -> FailoverSettings {
        FailoverSettings {
            poll: PollPolicy::immediate(max_attempts),
            ..FailoverSettings::default()
        }
    }

    /// Five instances over three scale sets, validator on `dot-b-1`.
    fn five_instance_fleet() -> FakeFleet {
        FakeFleet::new()
            .with_scale_set(
                "dot-a",
                vec![vm("0", "dot-a-0", "eastus"), vm("1", "dot-a-1", "eastus")],
            )
            .with_scale_set(
                "dot-b",
                vec![vm("0", "dot-b-0", "westeurope"), vm("1", "dot-b-1", "westeurope")],
            )
            .with_scale_set("dot-c", vec![vm("0", "dot-c-0", "centralus")])
            .with_validator("dot-b-1")
    }

    fn scale_sets() -> Vec<String> {
        vec!["dot-a".to_string(), "dot-b".to_string(), "dot-c".to_string()]
    }

    fn found(scale_set: &str, hostname: &str) -> ValidatorLookup {
        ValidatorLookup::Found(Validator {
            scale_set_name: scale_set.to_string(),
            hostname: hostname.to_string(),
        })
    }

    async fn snapshot(fleet: &FakeFleet) -> VmInventory {
        use crate::fleet::TopologyEnumerator;
        fleet.list_instances("dot", RG).await.unwrap()
    }

    #[tokio::test]
    async fn test_prunes_to_single_survivor() {
        let (fleet, clients) = five_instance_fleet().into_clients();
        let inventory = snapshot(&fleet).await;
        let lookup = found("dot-b", "dot-b-1");
        let query = validator_query(&spec(), &scale_sets(), Duration::from_secs(300));

        let report = converge(
            &clients,
            &settings(10),
            &ConvergenceRequest {
                resource_group: RG,
                prefix: "dot",
                validator: &lookup,
                inventory: &inventory,
                validator_query: &query,
            },
        )
        .await
        .unwrap();

        assert_eq!(
            report,
            ConvergenceReport::Converged {
                deleted: 4,
                remaining: 1,
                validator: lookup.validator().cloned(),
            }
        );
        assert_eq!(fleet.remaining_hostnames(), vec!["dot-b-1".to_string()]);

        // One request per scale set holding something to delete
        let deletions = fleet.deletions();
        assert_eq!(deletions.len(), 3);
        assert_eq!(deletions[0].scale_set_name, "dot-a");
        assert_eq!(deletions[0].instance_ids, vec!["0".to_string(), "1".to_string()]);
        assert_eq!(deletions[1].scale_set_name, "dot-b");
        assert_eq!(deletions[1].instance_ids, vec!["0".to_string()]);
        assert_eq!(deletions[2].scale_set_name, "dot-c");
        assert!(deletions.iter().all(|call| !call.adjust_capacity));
    }

    #[tokio::test]
    async fn test_adjust_capacity_is_forwarded() {
        let (fleet, clients) = five_instance_fleet().into_clients();
        let inventory = snapshot(&fleet).await;
        let lookup = found("dot-b", "dot-b-1");
        let query = validator_query(&spec(), &scale_sets(), Duration::from_secs(300));
        let settings = FailoverSettings {
            adjust_capacity_on_prune: true,
            ..settings(10)
        };

        converge(
            &clients,
            &settings,
            &ConvergenceRequest {
                resource_group: RG,
                prefix: "dot",
                validator: &lookup,
                inventory: &inventory,
                validator_query: &query,
            },
        )
        .await
        .unwrap();

        assert!(fleet.deletions().iter().all(|call| call.adjust_capacity));
    }

    #[tokio::test]
    async fn test_rerun_on_converged_fleet_deletes_nothing() {
        let (fleet, clients) = FakeFleet::new()
            .with_scale_set("dot-b", vec![vm("1", "dot-b-1", "westeurope")])
            .with_validator("dot-b-1")
            .into_clients();
        let inventory = snapshot(&fleet).await;
        let lookup = found("dot-b", "dot-b-1");
        let query = validator_query(&spec(), &["dot-b".to_string()], Duration::from_secs(300));

        let report = converge(
            &clients,
            &settings(3),
            &ConvergenceRequest {
                resource_group: RG,
                prefix: "dot",
                validator: &lookup,
                inventory: &inventory,
                validator_query: &query,
            },
        )
        .await
        .unwrap();

        assert_eq!(report.deleted(), 0);
        assert!(fleet.deletions().is_empty());
        // Snapshot plus a single converged poll
        assert_eq!(fleet.instance_list_count(), 2);
        assert_eq!(fleet.metric_query_count(), 1);
    }

    #[tokio::test]
    async fn test_frozen_fleet_times_out_after_one_delete_round() {
        let (fleet, clients) = five_instance_fleet().frozen().into_clients();
        let inventory = snapshot(&fleet).await;
        let lookup = found("dot-b", "dot-b-1");
        let query = validator_query(&spec(), &scale_sets(), Duration::from_secs(300));

        let err = converge(
            &clients,
            &settings(4),
            &ConvergenceRequest {
                resource_group: RG,
                prefix: "dot",
                validator: &lookup,
                inventory: &inventory,
                validator_query: &query,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            FailoverError::ConvergenceTimeout {
                expected: 1,
                observed: 5,
                attempts: 4,
            }
        ));
        assert!(err.is_poll_timeout());
        assert_eq!(fleet.deletions().len(), 3);
        // Snapshot plus four polls
        assert_eq!(fleet.instance_list_count(), 5);
        assert_eq!(fleet.metric_query_count(), 0);
    }

    #[tokio::test]
    async fn test_skipped_without_validator() {
        let (fleet, clients) = five_instance_fleet().into_clients();
        let inventory = snapshot(&fleet).await;
        let calls_before = fleet.total_calls();
        let query = validator_query(&spec(), &scale_sets(), Duration::from_secs(300));

        let report = converge(
            &clients,
            &settings(3),
            &ConvergenceRequest {
                resource_group: RG,
                prefix: "dot",
                validator: &ValidatorLookup::NotFound,
                inventory: &inventory,
                validator_query: &query,
            },
        )
        .await
        .unwrap();

        assert_eq!(report, ConvergenceReport::Skipped);
        assert_eq!(fleet.total_calls(), calls_before);
        assert_eq!(fleet.remaining_hostnames().len(), 5);
    }

    #[tokio::test]
    async fn test_stale_validator_host_skips_pruning() {
        let (fleet, clients) = FakeFleet::new()
            .with_scale_set(
                "dot-a",
                vec![vm("0", "dot-a-0", "eastus"), vm("1", "dot-a-1", "eastus")],
            )
            .with_scale_set("dot-b", vec![vm("0", "dot-b-0", "westeurope")])
            .into_clients();
        let inventory = snapshot(&fleet).await;
        let calls_before = fleet.total_calls();
        // Telemetry still reports a host that has already left the fleet
        let lookup = found("dot-b", "dot-b-9");
        let query = validator_query(&spec(), &scale_sets(), Duration::from_secs(300));

        let report = converge(
            &clients,
            &settings(3),
            &ConvergenceRequest {
                resource_group: RG,
                prefix: "dot",
                validator: &lookup,
                inventory: &inventory,
                validator_query: &query,
            },
        )
        .await
        .unwrap();

        assert_eq!(report, ConvergenceReport::Skipped);
        assert!(fleet.deletions().is_empty());
        assert_eq!(fleet.total_calls(), calls_before);
        assert_eq!(fleet.remaining_hostnames().len(), 3);
    }

    #[tokio::test]
    async fn test_drains_without_validator_when_enabled() {
        let (fleet, clients) = five_instance_fleet().into_clients();
        let inventory = snapshot(&fleet).await;
        let query = validator_query(&spec(), &scale_sets(), Duration::from_secs(300));
        let settings = FailoverSettings {
            prune_without_validator: true,
            ..settings(3)
        };

        let report = converge(
            &clients,
            &settings,
            &ConvergenceRequest {
                resource_group: RG,
                prefix: "dot",
                validator: &ValidatorLookup::NotFound,
                inventory: &inventory,
                validator_query: &query,
            },
        )
        .await
        .unwrap();

        assert_eq!(
            report,
            ConvergenceReport::Converged {
                deleted: 5,
                remaining: 0,
                validator: None,
            }
        );
        assert!(fleet.remaining_hostnames().is_empty());
        assert_eq!(fleet.metric_query_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_failure_aborts_pass() {
        let (fleet, clients) = five_instance_fleet()
            .with_delete_error(GatewayError::Http {
                endpoint: "http://fleet".to_string(),
                status_code: 409,
                message: "conflict".to_string(),
            })
            .into_clients();
        let inventory = snapshot(&fleet).await;
        let lookup = found("dot-b", "dot-b-1");
        let query = validator_query(&spec(), &scale_sets(), Duration::from_secs(300));
        let lists_before = fleet.instance_list_count();

        let err = converge(
            &clients,
            &settings(3),
            &ConvergenceRequest {
                resource_group: RG,
                prefix: "dot",
                validator: &lookup,
                inventory: &inventory,
                validator_query: &query,
            },
        )
        .await
        .unwrap_err();

        match err {
            FailoverError::InstanceDeletion {
                scale_set,
                instance_count,
                ..
            } => {
                assert_eq!(scale_set, "dot-a");
                assert_eq!(instance_count, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // No retry, no polling after the failed request
        assert_eq!(fleet.deletions().len(), 1);
        assert_eq!(fleet.instance_list_count(), lists_before);
    }

    #[tokio::test]
    async fn test_validator_moving_elsewhere_times_out() {
        let (fleet, clients) = five_instance_fleet().into_clients();
        let inventory = snapshot(&fleet).await;
        let lookup = found("dot-b", "dot-b-1");
        let query = validator_query(&spec(), &scale_sets(), Duration::from_secs(300));
        // Telemetry stops reporting the survivor
        fleet.set_validator(None);

        let err = converge(
            &clients,
            &settings(3),
            &ConvergenceRequest {
                resource_group: RG,
                prefix: "dot",
                validator: &lookup,
                inventory: &inventory,
                validator_query: &query,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            FailoverError::ValidatorWaitTimeout {
                ref hostname,
                attempts: 3,
            } if hostname == "dot-b-1"
        ));
        assert_eq!(fleet.metric_query_count(), 3);
    }

    #[tokio::test]
    async fn test_wait_for_instance_count_propagates_gateway_error() {
        let (_fleet, clients) = FakeFleet::new()
            .with_topology_error(GatewayError::Connection {
                endpoint: "http://fleet".to_string(),
                reason: "refused".to_string(),
            })
            .into_clients();

        let err = wait_for_instance_count(
            clients.topology.as_ref(),
            "dot",
            RG,
            1,
            &PollPolicy::immediate(5),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            FailoverError::Gateway {
                operation: "list instances",
                ..
            }
        ));
    }
}
