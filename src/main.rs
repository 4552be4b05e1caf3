// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use futures::StreamExt;
use kube::{
    runtime::{controller::Action, watcher::Config, Controller},
    Api, Client, ResourceExt,
};
use kube_lease_manager::LeaseManagerBuilder;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use validator_failover::{
    config::{LeaderElectionConfig, OperatorConfig},
    constants::{
        CONVERGED_REQUEUE_DURATION_SECS, ERROR_REQUEUE_DURATION_SECS,
        FLEET_API_REQUEST_TIMEOUT_SECS, METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PATH,
        PENDING_REQUEUE_DURATION_SECS, TOKIO_WORKER_THREADS,
    },
    context::Context,
    crd::{FailoverPhase, ValidatorFailover},
    fleet::{FleetApiClient, FleetClients},
    metrics,
    reconcilers::reconcile_validator_failover,
};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] anyhow::Error);

fn main() -> Result<()> {
    // reqwest and kube both build on rustls, pick the ring provider once for the process
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install the rustls ring crypto provider"))?;

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("validator-failover")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    // Respects RUST_LOG (default INFO) and RUST_LOG_FORMAT (json or text)
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting Validator Failover Controller");

    let config = OperatorConfig::from_env().context("Invalid operator configuration")?;
    debug!(
        fleet_api_url = %config.fleet_api_url,
        prune_in_single_mode = config.failover.delete_vms_with_api_in_single_mode,
        prune_without_validator = config.failover.prune_without_validator,
        poll_attempts = config.failover.poll.max_attempts,
        "Configuration loaded"
    );

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(FLEET_API_REQUEST_TIMEOUT_SECS))
        .build()?;
    let fleet_client = FleetApiClient::new(
        http,
        config.fleet_api_url.clone(),
        config.fleet_api_token.clone(),
    );
    let fleet = FleetClients::from_client(Arc::new(fleet_client));

    let ctx = Arc::new(Context::new(client, fleet, config.failover.clone()));

    let controller = async {
        if config.leader_election.enabled {
            run_with_leader_election(ctx.clone(), &config.leader_election).await
        } else {
            warn!("Leader election disabled, running the controller unconditionally");
            run_validator_failover_controller(ctx.clone()).await
        }
    };

    // The controller should never exit on its own
    tokio::select! {
        result = controller => {
            error!("CRITICAL: ValidatorFailover controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("ValidatorFailover controller exited unexpectedly without error")
        }
        result = run_metrics_server(config.metrics_port) => {
            error!("CRITICAL: Metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Metrics server exited unexpectedly without error")
        }
        result = shutdown_signal() => {
            result?;
            info!("Shutdown signal received, stopping");
            Ok(())
        }
    }
}

/// Resolve on SIGTERM or Ctrl+C.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = sigterm.recv() => debug!("Received SIGTERM"),
            result = tokio::signal::ctrl_c() => {
                result?;
                debug!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}

/// Serve the Prometheus registry.
async fn run_metrics_server(port: u16) -> Result<()> {
    let app = Router::new().route(METRICS_SERVER_PATH, get(metrics_handler));

    let addr = format!("{METRICS_SERVER_BIND_ADDRESS}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Metrics server listening on http://{}{}", addr, METRICS_SERVER_PATH);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn metrics_handler() -> impl IntoResponse {
    match metrics::gather_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Run the controller only while this replica holds the leader lease.
///
/// Losing the lease terminates the process so a restarted replica rejoins the
/// election with a clean controller state.
async fn run_with_leader_election(
    ctx: Arc<Context>,
    config: &LeaderElectionConfig,
) -> Result<()> {
    info!(
        lease = %config.lease_name,
        namespace = %config.lease_namespace,
        identity = %config.identity,
        "Starting leader election"
    );

    let manager = LeaseManagerBuilder::new(ctx.client.clone(), &config.lease_name)
        .with_namespace(&config.lease_namespace)
        .with_identity(&config.identity)
        .with_duration(config.lease_duration.as_secs())
        .with_grace(config.grace.as_secs())
        .build()
        .await?;
    let (mut leader_rx, lease_task) = manager.watch().await;

    metrics::record_leader_standby(&config.identity);
    while !*leader_rx.borrow_and_update() {
        debug!("Not the leader, waiting for the lease");
        leader_rx
            .changed()
            .await
            .context("Leader election task stopped")?;
    }

    info!("Acquired leadership of lease {}", config.lease_name);
    metrics::record_leader_elected(&config.identity);

    let result = tokio::select! {
        result = run_validator_failover_controller(ctx) => result,
        () = leadership_lost(&mut leader_rx) => {
            metrics::record_leader_lost(&config.identity);
            Err(anyhow::anyhow!("Lost leadership of lease {}", config.lease_name))
        }
    };

    lease_task.abort();
    result
}

/// Resolve once the lease is no longer held.
async fn leadership_lost(leader_rx: &mut watch::Receiver<bool>) {
    loop {
        if leader_rx.changed().await.is_err() || !*leader_rx.borrow_and_update() {
            return;
        }
    }
}

/// Run the `ValidatorFailover` controller
async fn run_validator_failover_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting ValidatorFailover controller");

    let api = Api::<ValidatorFailover>::all(ctx.client.clone());

    Controller::new(api, Config::default())
        .run(reconcile_validator_failover_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Requeue interval after a pass that committed `phase`.
///
/// Converged objects are re-read less frequently than objects still settling.
fn requeue_after(phase: FailoverPhase) -> Duration {
    if phase == FailoverPhase::Converged {
        Duration::from_secs(CONVERGED_REQUEUE_DURATION_SECS)
    } else {
        Duration::from_secs(PENDING_REQUEUE_DURATION_SECS)
    }
}

/// Reconcile wrapper for `ValidatorFailover`
async fn reconcile_validator_failover_wrapper(
    failover: Arc<ValidatorFailover>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    debug!(
        name = %failover.name_any(),
        namespace = ?failover.namespace(),
        "Reconcile wrapper called for ValidatorFailover"
    );

    match reconcile_validator_failover(ctx, (*failover).clone()).await {
        Ok(phase) => {
            info!(
                "Successfully reconciled ValidatorFailover: {} ({})",
                failover.name_any(),
                phase
            );
            Ok(Action::requeue(requeue_after(phase)))
        }
        Err(e) => {
            error!("Failed to reconcile ValidatorFailover: {:#}", e);
            Err(e.into())
        }
    }
}

/// Error policy for the `ValidatorFailover` controller
fn error_policy(
    _resource: Arc<ValidatorFailover>,
    _err: &ReconcileError,
    _ctx: Arc<Context>,
) -> Action {
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}
