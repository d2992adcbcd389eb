// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use kube::{Client, CustomResourceExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rigger::config::Config;
use rigger::kubernetes::{wait_for_plan_crd, watch_plans, watch_secrets, KubeStore};
use rigger::queue::WorkQueue;
use rigger::reconcilers::{DestinationReconciler, PlanReconciler, SourceReconciler};
use rigger::registry::PlanRegistry;
use rigger::store::ObjectStore;
use rigger::types::Plan;

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::args().nth(1).as_deref() == Some("crd") {
        print!("{}", serde_yaml::to_string(&Plan::crd())?);
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Rigger operator");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        "Configuration loaded: workers={} queue_capacity={} reconcile_timeout={:?}",
        config.worker_count, config.queue_capacity, config.reconcile_timeout
    );

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    info!("Connected to Kubernetes cluster");

    // Wait for the Plan CRD before starting reconcilers
    info!("Waiting for Plan CRD to become available...");
    wait_for_plan_crd(&client).await?;

    let registry = Arc::new(PlanRegistry::new());
    let store: Arc<dyn ObjectStore> = Arc::new(KubeStore::new(client.clone()));

    let (plan_queue, plan_handle) = WorkQueue::new("plan", config.queue_capacity);
    let (source_queue, source_handle) = WorkQueue::new("source", config.queue_capacity);
    let (dest_queue, dest_handle) = WorkQueue::new("destination", config.queue_capacity);

    let plans = Arc::new(PlanReconciler::new(Arc::clone(&store), Arc::clone(&registry), &config));
    let sources = Arc::new(SourceReconciler::new(Arc::clone(&store), Arc::clone(&registry)));
    let destinations = Arc::new(DestinationReconciler::new(store, registry));

    let shutdown = CancellationToken::new();
    let signal = {
        let shutdown = shutdown.clone();
        async move {
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for shutdown signal")?;
            info!("Shutdown requested, stopping reconcilers");
            shutdown.cancel();
            Ok::<_, anyhow::Error>(())
        }
    };

    info!("Starting reconcilers...");

    tokio::try_join!(
        signal,
        plan_queue.run(plans, config.clone(), shutdown.clone()),
        source_queue.run(sources, config.clone(), shutdown.clone()),
        dest_queue.run(destinations, config.clone(), shutdown.clone()),
        watch_plans(client.clone(), plan_handle, shutdown.clone()),
        watch_secrets(client, source_handle, dest_handle, shutdown.clone()),
    )?;

    info!("Rigger operator stopped");
    Ok(())
}
