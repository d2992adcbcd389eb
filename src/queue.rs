// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Bounded per-kind event queues drained by a pool of workers.

use crate::config::Config;
use crate::context::ReconcileContext;
use crate::error::{Result, RiggerError};
use crate::reconcilers::Reconcile;
use kube::{Resource, ResourceExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Identity of the object an event refers to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    pub fn namespace_or_default(&self) -> &str {
        self.namespace.as_deref().unwrap_or_default()
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A change notification delivered by the event source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEvent {
    pub key: ObjectKey,
    pub deleted: bool,
}

impl ObjectEvent {
    pub fn new(key: ObjectKey, deleted: bool) -> Self {
        Self { key, deleted }
    }

    pub fn from_resource<K: Resource>(obj: &K, deleted: bool) -> Self {
        Self {
            key: ObjectKey {
                namespace: obj.namespace(),
                name: obj.name_any(),
            },
            deleted,
        }
    }
}

#[derive(Debug)]
struct Delivery {
    event: ObjectEvent,
    attempt: u32,
}

/// Queue of events for one kind of reconciler
pub struct WorkQueue {
    name: &'static str,
    rx: mpsc::Receiver<Delivery>,
    tx: mpsc::Sender<Delivery>,
}

/// Handle to push events into a WorkQueue
#[derive(Clone)]
pub struct WorkQueueHandle {
    tx: mpsc::Sender<Delivery>,
}

impl WorkQueueHandle {
    pub async fn send(&self, event: ObjectEvent) -> Result<()> {
        self.tx
            .send(Delivery { event, attempt: 0 })
            .await
            .map_err(|_| RiggerError::QueueClosed)
    }
}

impl WorkQueue {
    pub fn new(name: &'static str, capacity: usize) -> (Self, WorkQueueHandle) {
        let (tx, rx) = mpsc::channel(capacity);

        let queue = Self {
            name,
            rx,
            tx: tx.clone(),
        };

        (queue, WorkQueueHandle { tx })
    }

    /// Drain the queue with `config.worker_count` workers until `shutdown` fires
    pub async fn run(
        self,
        reconciler: Arc<dyn Reconcile>,
        config: Config,
        shutdown: CancellationToken,
    ) -> anyhow::Result<()> {
        info!(
            "Starting {} queue with {} {} workers",
            self.name,
            config.worker_count,
            reconciler.kind()
        );

        let rx = Arc::new(Mutex::new(self.rx));
        let config = Arc::new(config);
        let mut workers = JoinSet::new();

        for id in 0..config.worker_count {
            workers.spawn(worker(
                Worker {
                    id,
                    queue: self.name,
                    reconciler: Arc::clone(&reconciler),
                    config: Arc::clone(&config),
                    requeue: self.tx.clone(),
                    shutdown: shutdown.clone(),
                },
                Arc::clone(&rx),
            ));
        }

        while let Some(res) = workers.join_next().await {
            res?;
        }

        info!("{} queue stopped", self.name);
        Ok(())
    }
}

struct Worker {
    id: usize,
    queue: &'static str,
    reconciler: Arc<dyn Reconcile>,
    config: Arc<Config>,
    requeue: mpsc::Sender<Delivery>,
    shutdown: CancellationToken,
}

async fn worker(w: Worker, rx: Arc<Mutex<mpsc::Receiver<Delivery>>>) {
    loop {
        let next = tokio::select! {
            _ = w.shutdown.cancelled() => None,
            delivery = async { rx.lock().await.recv().await } => delivery,
        };
        let Some(delivery) = next else {
            break;
        };

        let ctx = ReconcileContext::new(w.shutdown.child_token(), w.config.reconcile_timeout);
        let event = &delivery.event;

        match w.reconciler.reconcile(event, &ctx).await {
            Ok(()) => debug!(
                "[{}#{}] Reconciled {} (deleted={})",
                w.queue, w.id, event.key, event.deleted
            ),
            Err(RiggerError::Cancelled) if w.shutdown.is_cancelled() => break,
            Err(e) => {
                let attempt = delivery.attempt + 1;
                let delay = w.config.retry_delay(attempt);
                warn!(
                    "[{}#{}] Reconciliation of {} failed (attempt {}), retrying in {:?}: {}",
                    w.queue, w.id, event.key, attempt, delay, e
                );
                schedule_retry(
                    w.requeue.clone(),
                    Delivery {
                        event: delivery.event,
                        attempt,
                    },
                    delay,
                    w.shutdown.clone(),
                );
            }
        }
    }
}

fn schedule_retry(
    tx: mpsc::Sender<Delivery>,
    delivery: Delivery,
    delay: Duration,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown.cancelled() => {}
            _ = tokio::time::sleep(delay) => {
                let key = delivery.event.key.clone();
                if tx.send(delivery).await.is_err() {
                    error!("Failed to requeue {}: queue closed", key);
                }
            }
        }
    });
}
