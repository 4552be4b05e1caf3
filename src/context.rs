// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context handed to the `ValidatorFailover` controller.
//!
//! The controller receives an `Arc<Context>` holding the Kubernetes client, the
//! fleet collaborators and the failover settings. Nothing in it is mutated after
//! startup.

use crate::config::FailoverSettings;
use crate::fleet::FleetClients;
use crate::reconcilers::failover::resource::FailoverEngine;
use kube::Client;

/// Shared context passed to the controller.
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client for API operations
    pub client: Client,

    /// Fleet gateway collaborators
    pub fleet: FleetClients,

    /// Feature flags, poll bounds and deadlines of a failover pass
    pub settings: FailoverSettings,
}

impl Context {
    #[must_use]
    pub fn new(client: Client, fleet: FleetClients, settings: FailoverSettings) -> Self {
        Self {
            client,
            fleet,
            settings,
        }
    }

    /// Failover engine bound to this context's fleet and settings.
    #[must_use]
    pub fn engine(&self) -> FailoverEngine<'_> {
        FailoverEngine::new(&self.fleet, &self.settings)
    }
}
