// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tests for the count matrix builder.

#[cfg(test)]
mod tests {
    use crate::crd::{FailoverMode, ValidatorFailoverSpec};
    use crate::reconcilers::failover::counts::{build_counts, fill_default_counts, CountSource};

    fn spec(mode: FailoverMode, instances: Vec<i32>) -> ValidatorFailoverSpec {
        ValidatorFailoverSpec {
            prefix: "dot".to_string(),
            resource_group: "validators".to_string(),
            locations: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            failover_mode: mode,
            instances,
            metric_name: "validator_value".to_string(),
            metric_namespace: "polkadot".to_string(),
            delete_vms_with_api_in_single_mode: None,
        }
    }

    #[test]
    fn test_distributed_is_verbatim() {
        assert_eq!(build_counts(CountSource::Distributed(&[2, 0, 3]), 3), vec![2, 0, 3]);
    }

    #[test]
    fn test_single_marks_validator_location() {
        let counts = build_counts(CountSource::Single(Some(1)), 3);
        assert_eq!(counts, vec![0, 1, 0]);
        assert_eq!(counts.iter().sum::<i32>(), 1);
    }

    #[test]
    fn test_single_without_validator_is_all_zero() {
        let counts = build_counts(CountSource::Single(None), 3);
        assert_eq!(counts, vec![0, 0, 0]);
        assert_eq!(counts.iter().sum::<i32>(), 0);
    }

    #[test]
    fn test_single_out_of_range_is_all_zero() {
        assert_eq!(build_counts(CountSource::Single(Some(7)), 3), vec![0, 0, 0]);
    }

    #[test]
    fn test_single_sum_never_exceeds_one() {
        for n in 0..5 {
            for index in [None, Some(0), Some(1), Some(4), Some(9)] {
                let sum: i32 = build_counts(CountSource::Single(index), n).iter().sum();
                assert!(sum <= 1, "n={n} index={index:?} sum={sum}");
            }
        }
    }

    #[test]
    fn test_fill_default_keeps_well_formed_matrix() {
        let spec = spec(FailoverMode::Single, vec![]);
        assert_eq!(fill_default_counts(vec![0, 0, 0], &spec), vec![0, 0, 0]);
        assert_eq!(fill_default_counts(vec![0, 0, 1], &spec), vec![0, 0, 1]);
    }

    #[test]
    fn test_fill_default_single_baseline() {
        let spec = spec(FailoverMode::Single, vec![]);
        assert_eq!(fill_default_counts(vec![], &spec), vec![1, 0, 0]);
    }

    #[test]
    fn test_fill_default_distributed_baseline() {
        let spec = spec(FailoverMode::Distributed, vec![1, 2, 1]);
        assert_eq!(fill_default_counts(vec![], &spec), vec![1, 2, 1]);
        assert_eq!(fill_default_counts(vec![5], &spec), vec![1, 2, 1]);
    }
}
