// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Validator Failover - Multi-region validator operator for Kubernetes
//!
//! A Kubernetes operator written in Rust that keeps a multi-region validator
//! cluster aligned with its declared layout through a `ValidatorFailover`
//! Custom Resource Definition.
//!
//! ## Overview
//!
//! This library provides the core functionality of the operator:
//!
//! - Detection of the elected validator from aggregated telemetry
//! - Resolution of the validator's location and the per-location count matrix
//! - Single-mode convergence: pruning of standby instances and bounded polling
//! - A Create/Read/Delete state machine persisted in the resource status
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types
//! - [`reconcilers`] - Reconciliation logic and the failover state machine
//! - [`fleet`] - Fleet gateway collaborators (metrics, topology, mutation)
//! - [`context`] - Shared context for the controller
//! - [`config`] - Operator configuration from the environment
//! - [`identity`] - Failover identity encoding
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
//!
//! ```rust,no_run
//! use validator_failover::crd::{FailoverMode, ValidatorFailoverSpec};
//!
//! let spec = ValidatorFailoverSpec {
//!     prefix: "dot".to_string(),
//!     resource_group: "validators".to_string(),
//!     locations: vec!["eastus".to_string(), "westeurope".to_string()],
//!     failover_mode: FailoverMode::Distributed,
//!     instances: vec![1, 1],
//!     metric_name: "validator_value".to_string(),
//!     metric_namespace: "polkadot".to_string(),
//!     delete_vms_with_api_in_single_mode: None,
//! };
//! ```
//!
//! ## Features
//!
//! - **Leader Detection** - Deterministic validator selection from metric samples
//! - **Distributed and Single Modes** - Static layouts or live single-leader inference
//! - **Bounded Convergence** - Explicit poll interval, attempt bound and operation deadlines
//! - **Status Tracking** - Full status subresource with conditions

pub mod config;
pub mod constants;
pub mod context;
pub mod crd;
pub mod failover_errors;
pub mod fleet;
pub mod identity;
pub mod labels;
pub mod metrics;
pub mod reconcilers;
pub mod status_reasons;

#[cfg(test)]
mod crd_tests;
