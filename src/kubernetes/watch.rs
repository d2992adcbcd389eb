// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Watch streams feeding the work queues

use crate::queue::{ObjectEvent, WorkQueueHandle};
use crate::types::labels::is_managed;
use crate::types::Plan;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client, ResourceExt};
use kube_runtime::watcher::{self, watcher, Event};
use kube_runtime::WatchStreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Object carried by a watcher event and whether it was deleted
fn change<K>(event: Event<K>) -> Option<(K, bool)> {
    match event {
        Event::Apply(obj) | Event::InitApply(obj) => Some((obj, false)),
        Event::Delete(obj) => Some((obj, true)),
        Event::Init | Event::InitDone => None,
    }
}

/// Stream Plan changes into the plan queue until `shutdown` fires
pub async fn watch_plans(
    client: Client,
    queue: WorkQueueHandle,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let plans: Api<Plan> = Api::all(client);
    let mut stream = watcher(plans, watcher::Config::default())
        .default_backoff()
        .boxed();

    info!("Watching plans");
    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(event)) => {
                if let Some((plan, deleted)) = change(event) {
                    debug!("Plan {} changed (deleted={})", plan.name_any(), deleted);
                    queue.send(ObjectEvent::from_resource(&plan, deleted)).await?;
                }
            }
            Some(Err(e)) => warn!("Plan watch error: {}", e),
            None => break,
        }
    }

    info!("Plan watch stopped");
    Ok(())
}

/// Stream Secret changes into the source queue, and managed ones into the destination queue too
pub async fn watch_secrets(
    client: Client,
    sources: WorkQueueHandle,
    destinations: WorkQueueHandle,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let secrets: Api<Secret> = Api::all(client);
    let mut stream = watcher(secrets, watcher::Config::default())
        .default_backoff()
        .boxed();

    info!("Watching secrets");
    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(event)) => {
                let Some((secret, deleted)) = change(event) else {
                    continue;
                };
                let event = ObjectEvent::from_resource(&secret, deleted);
                if is_managed(&secret) {
                    destinations.send(event.clone()).await?;
                }
                sources.send(event).await?;
            }
            Some(Err(e)) => warn!("Secret watch error: {}", e),
            None => break,
        }
    }

    info!("Secret watch stopped");
    Ok(())
}
