// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator configuration.
//!
//! All tunables are read once at startup into an [`OperatorConfig`] and handed to
//! the reconcilers through the [`crate::context::Context`]. Nothing reads the
//! environment after startup.
//!
//! # Environment Variables
//!
//! | Variable | Default | Purpose |
//! |----------|---------|---------|
//! | `FLEET_API_URL` | required | Fleet gateway base URL |
//! | `FLEET_API_TOKEN` | unset | Bearer token for the gateway |
//! | `FAILOVER_DELETE_VMS_WITH_API_IN_SINGLE_MODE` | `false` | Prune standby instances in single mode |
//! | `FAILOVER_ADJUST_CAPACITY_ON_PRUNE` | `false` | Shrink scale-set capacity when pruning |
//! | `FAILOVER_PRUNE_WITHOUT_VALIDATOR` | `false` | Drain the fleet when no validator is known |
//! | `FAILOVER_POLL_INTERVAL_SECS` | `5` | Delay between convergence polls |
//! | `FAILOVER_POLL_MAX_ATTEMPTS` | `120` | Convergence and validator poll bound |
//! | `FAILOVER_METRIC_WINDOW_SECS` | `300` | Metrics query window |
//! | `FAILOVER_CREATE_TIMEOUT_SECS` | `5400` | Create/Update deadline |
//! | `FAILOVER_READ_TIMEOUT_SECS` | `1800` | Read deadline |
//! | `METRICS_SERVER_PORT` | `8080` | Prometheus endpoint port |
//! | `ENABLE_LEADER_ELECTION` | `true` | Elect one active operator replica |
//! | `POD_NAMESPACE` | `default` | Namespace of the leader election lease |
//! | `POD_NAME` | `$HOSTNAME` | Lease holder identity |

use crate::constants::{
    DEFAULT_CREATE_TIMEOUT_SECS, DEFAULT_LEASE_DURATION_SECS, DEFAULT_LEASE_GRACE_SECS,
    DEFAULT_METRIC_WINDOW_SECS, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POLL_MAX_ATTEMPTS,
    DEFAULT_READ_TIMEOUT_SECS, LEADER_LEASE_NAME, METRICS_SERVER_PORT,
};
use crate::crd::ValidatorFailoverSpec;
use crate::reconcilers::failover::poll::PollPolicy;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const ENV_FLEET_API_URL: &str = "FLEET_API_URL";
pub const ENV_FLEET_API_TOKEN: &str = "FLEET_API_TOKEN";
pub const ENV_DELETE_VMS_WITH_API_IN_SINGLE_MODE: &str =
    "FAILOVER_DELETE_VMS_WITH_API_IN_SINGLE_MODE";
pub const ENV_ADJUST_CAPACITY_ON_PRUNE: &str = "FAILOVER_ADJUST_CAPACITY_ON_PRUNE";
pub const ENV_PRUNE_WITHOUT_VALIDATOR: &str = "FAILOVER_PRUNE_WITHOUT_VALIDATOR";
pub const ENV_POLL_INTERVAL_SECS: &str = "FAILOVER_POLL_INTERVAL_SECS";
pub const ENV_POLL_MAX_ATTEMPTS: &str = "FAILOVER_POLL_MAX_ATTEMPTS";
pub const ENV_METRIC_WINDOW_SECS: &str = "FAILOVER_METRIC_WINDOW_SECS";
pub const ENV_CREATE_TIMEOUT_SECS: &str = "FAILOVER_CREATE_TIMEOUT_SECS";
pub const ENV_READ_TIMEOUT_SECS: &str = "FAILOVER_READ_TIMEOUT_SECS";
pub const ENV_METRICS_SERVER_PORT: &str = "METRICS_SERVER_PORT";
pub const ENV_ENABLE_LEADER_ELECTION: &str = "ENABLE_LEADER_ELECTION";
pub const ENV_POD_NAMESPACE: &str = "POD_NAMESPACE";
pub const ENV_POD_NAME: &str = "POD_NAME";

/// Configuration errors, each naming the offending variable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty
    #[error("Required environment variable {name} is not set")]
    Missing {
        /// Variable name
        name: &'static str,
    },

    /// A variable holds a value that cannot be parsed
    #[error("Environment variable {name} has invalid value '{value}': {reason}")]
    Invalid {
        /// Variable name
        name: &'static str,
        /// The rejected value
        value: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Behaviour of failover reconciliation passes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailoverSettings {
    /// Prune standby instances in single mode (overridable per object)
    pub delete_vms_with_api_in_single_mode: bool,
    /// Shrink scale-set capacity in the same call that deletes instances
    pub adjust_capacity_on_prune: bool,
    /// Delete every instance when no validator is known, instead of skipping pruning
    pub prune_without_validator: bool,
    /// Interval and bound of convergence and validator polls
    pub poll: PollPolicy,
    /// How far back metric queries look
    pub metric_window: Duration,
    /// Deadline of a Create/Update pass, including its chained Read
    pub create_timeout: Duration,
    /// Deadline of a Read pass
    pub read_timeout: Duration,
}

impl Default for FailoverSettings {
    fn default() -> Self {
        Self {
            delete_vms_with_api_in_single_mode: false,
            adjust_capacity_on_prune: false,
            prune_without_validator: false,
            poll: PollPolicy::default(),
            metric_window: Duration::from_secs(DEFAULT_METRIC_WINDOW_SECS),
            create_timeout: Duration::from_secs(DEFAULT_CREATE_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
        }
    }
}

impl FailoverSettings {
    /// Whether API-driven pruning applies to `spec`, honouring its per-object override.
    #[must_use]
    pub fn prune_enabled(&self, spec: &ValidatorFailoverSpec) -> bool {
        spec.delete_vms_with_api_in_single_mode
            .unwrap_or(self.delete_vms_with_api_in_single_mode)
    }
}

/// Leader election between operator replicas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeaderElectionConfig {
    pub enabled: bool,
    pub lease_name: String,
    pub lease_namespace: String,
    /// Holder identity written to the lease
    pub identity: String,
    pub lease_duration: Duration,
    pub grace: Duration,
}

/// Process-wide operator configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    pub fleet_api_url: String,
    pub fleet_api_token: Option<String>,
    pub metrics_port: u16,
    pub leader_election: LeaderElectionConfig,
    pub failover: FailoverSettings,
}

impl OperatorConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first missing or invalid variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first missing or invalid variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let fleet_api_url = get(ENV_FLEET_API_URL).ok_or(ConfigError::Missing {
            name: ENV_FLEET_API_URL,
        })?;
        url::Url::parse(&fleet_api_url).map_err(|e| ConfigError::Invalid {
            name: ENV_FLEET_API_URL,
            value: fleet_api_url.clone(),
            reason: e.to_string(),
        })?;

        let poll_interval: u64 = parse_or(
            get(ENV_POLL_INTERVAL_SECS),
            ENV_POLL_INTERVAL_SECS,
            DEFAULT_POLL_INTERVAL_SECS,
        )?;
        let max_attempts: u32 =
            parse_or(get(ENV_POLL_MAX_ATTEMPTS), ENV_POLL_MAX_ATTEMPTS, DEFAULT_POLL_MAX_ATTEMPTS)?;
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: ENV_POLL_MAX_ATTEMPTS,
                value: max_attempts.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let failover = FailoverSettings {
            delete_vms_with_api_in_single_mode: parse_bool_or(
                get(ENV_DELETE_VMS_WITH_API_IN_SINGLE_MODE),
                ENV_DELETE_VMS_WITH_API_IN_SINGLE_MODE,
                false,
            )?,
            adjust_capacity_on_prune: parse_bool_or(
                get(ENV_ADJUST_CAPACITY_ON_PRUNE),
                ENV_ADJUST_CAPACITY_ON_PRUNE,
                false,
            )?,
            prune_without_validator: parse_bool_or(
                get(ENV_PRUNE_WITHOUT_VALIDATOR),
                ENV_PRUNE_WITHOUT_VALIDATOR,
                false,
            )?,
            poll: PollPolicy::new(Duration::from_secs(poll_interval), max_attempts),
            metric_window: Duration::from_secs(parse_or(
                get(ENV_METRIC_WINDOW_SECS),
                ENV_METRIC_WINDOW_SECS,
                DEFAULT_METRIC_WINDOW_SECS,
            )?),
            create_timeout: Duration::from_secs(parse_or(
                get(ENV_CREATE_TIMEOUT_SECS),
                ENV_CREATE_TIMEOUT_SECS,
                DEFAULT_CREATE_TIMEOUT_SECS,
            )?),
            read_timeout: Duration::from_secs(parse_or(
                get(ENV_READ_TIMEOUT_SECS),
                ENV_READ_TIMEOUT_SECS,
                DEFAULT_READ_TIMEOUT_SECS,
            )?),
        };

        let identity = get(ENV_POD_NAME)
            .or_else(|| get("HOSTNAME"))
            .unwrap_or_else(|| "validator-failover".to_string());

        Ok(Self {
            fleet_api_url,
            fleet_api_token: get(ENV_FLEET_API_TOKEN),
            metrics_port: parse_or(
                get(ENV_METRICS_SERVER_PORT),
                ENV_METRICS_SERVER_PORT,
                METRICS_SERVER_PORT,
            )?,
            leader_election: LeaderElectionConfig {
                enabled: parse_bool_or(
                    get(ENV_ENABLE_LEADER_ELECTION),
                    ENV_ENABLE_LEADER_ELECTION,
                    true,
                )?,
                lease_name: LEADER_LEASE_NAME.to_string(),
                lease_namespace: get(ENV_POD_NAMESPACE).unwrap_or_else(|| "default".to_string()),
                identity,
                lease_duration: Duration::from_secs(DEFAULT_LEASE_DURATION_SECS),
                grace: Duration::from_secs(DEFAULT_LEASE_GRACE_SECS),
            },
            failover,
        })
    }
}

fn parse_or<T>(value: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}

fn parse_bool_or(
    value: Option<String>,
    name: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value,
            reason: "expected a boolean (true/false)".to_string(),
        }),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
