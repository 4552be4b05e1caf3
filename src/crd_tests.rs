// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use crate::constants::{API_GROUP, API_GROUP_VERSION, API_VERSION, KIND_VALIDATOR_FAILOVER};
    use crate::crd::*;
    use kube::{CustomResourceExt, Resource};
    use serde_json::json;

    #[test]
    fn test_spec_defaults_from_minimal_manifest() {
        let spec: ValidatorFailoverSpec = serde_json::from_value(json!({
            "prefix": "dot",
            "resourceGroup": "validators",
            "locations": ["eastus", "westeurope"]
        }))
        .unwrap();

        assert_eq!(spec.failover_mode, FailoverMode::Distributed);
        assert!(spec.is_distributed_mode());
        assert!(spec.instances.is_empty());
        assert_eq!(spec.metric_name, "validator_value");
        assert_eq!(spec.metric_namespace, "polkadot");
        assert_eq!(spec.delete_vms_with_api_in_single_mode, None);
    }

    #[test]
    fn test_spec_single_mode_wire_format() {
        let spec: ValidatorFailoverSpec = serde_json::from_value(json!({
            "prefix": "dot",
            "resourceGroup": "validators",
            "locations": ["eastus"],
            "failoverMode": "single",
            "metricName": "leader",
            "metricNamespace": "kusama",
            "deleteVmsWithApiInSingleMode": true
        }))
        .unwrap();

        assert_eq!(spec.failover_mode, FailoverMode::Single);
        assert!(!spec.is_distributed_mode());
        assert_eq!(spec.metric_name, "leader");
        assert_eq!(spec.delete_vms_with_api_in_single_mode, Some(true));

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["failoverMode"], "single");
        assert_eq!(value["resourceGroup"], "validators");
    }

    #[test]
    fn test_unknown_failover_mode_is_rejected() {
        let result = serde_json::from_value::<ValidatorFailoverSpec>(json!({
            "prefix": "dot",
            "resourceGroup": "validators",
            "locations": ["eastus"],
            "failoverMode": "active-active"
        }));

        assert!(result.is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(FailoverMode::Single.to_string(), "single");
        assert_eq!(FailoverMode::Distributed.to_string(), "distributed");
        assert_eq!(FailoverPhase::Converged.to_string(), "Converged");
        assert_eq!(FailoverPhase::default(), FailoverPhase::Uninitialized);
    }

    #[test]
    fn test_status_wire_format() {
        let status = ValidatorFailoverStatus {
            id: Some("fo1.abc".to_string()),
            failover_instances: vec![0, 1],
            phase: FailoverPhase::Converged,
            conditions: vec![],
            observed_generation: Some(2),
        };

        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["failoverInstances"], json!([0, 1]));
        assert_eq!(value["observedGeneration"], 2);
        assert_eq!(value["phase"], "Converged");

        let empty = serde_json::to_value(ValidatorFailoverStatus::default()).unwrap();
        assert!(empty.get("id").is_none());
    }

    #[test]
    fn test_crd_metadata() {
        let crd = ValidatorFailover::crd();

        assert_eq!(crd.spec.group, API_GROUP);
        assert_eq!(crd.spec.names.kind, KIND_VALIDATOR_FAILOVER);
        assert_eq!(crd.spec.scope, "Namespaced");
        assert_eq!(crd.spec.names.short_names, Some(vec!["vfo".to_string()]));
        assert!(crd.spec.versions.iter().any(|v| v.name == API_VERSION));
        assert_eq!(ValidatorFailover::api_version(&()), API_GROUP_VERSION);
    }
}
