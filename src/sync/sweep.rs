// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Plan-wide synchronization: the first full sweep, resyncs after spec changes
//! and cleanup of a deleted plan's mirrors.

use crate::context::ReconcileContext;
use crate::error::{Result, RiggerError};
use crate::store::ObjectStore;
use crate::sync::mirror::{create_or_replace, is_mirrorable, mirror_source, MirrorAction};
use crate::types::labels::{managed_selector, managed_source_selector};
use crate::types::naming::is_valid_source_namespace;
use crate::types::{PlanSnapshot, SourceRef};
use kube::ResourceExt;
use tracing::{error, info, instrument, warn};

/// Tally of a multi-object pass; any failure turns it into `PartialSync`
#[derive(Debug, Default)]
struct Tally {
    total: usize,
    failed: usize,
}

impl Tally {
    /// Record one object's outcome, propagating cancellation immediately
    fn record(&mut self, res: Result<()>, what: &str) -> Result<()> {
        self.total += 1;
        match res {
            Ok(()) => Ok(()),
            Err(e) if e.is_interrupted() => Err(e),
            Err(e) => {
                error!("Failed to sync {}: {}", what, e);
                self.failed += 1;
                Ok(())
            }
        }
    }

    fn finish(self) -> Result<usize> {
        if self.failed > 0 {
            Err(RiggerError::PartialSync {
                failed: self.failed,
                total: self.total,
            })
        } else {
            Ok(self.total)
        }
    }
}

/// How a sweep treats an object already holding the derived name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SweepMode {
    /// Overwrite whatever is there, last sweep wins
    Overwrite,
    /// Apply the decision table, writing only what differs
    Reconcile,
}

/// Mirror every matching secret in the cluster into the plan's destination.
///
/// Returns the number of secrets mirrored.
#[instrument(skip(store, ctx, plan), fields(plan = %plan.name))]
pub async fn full_sweep(
    store: &dyn ObjectStore,
    ctx: &ReconcileContext,
    plan: &PlanSnapshot,
) -> Result<usize> {
    sweep(store, ctx, plan, SweepMode::Overwrite).await
}

/// Sweep for an already synced plan, e.g. after a restart.
///
/// Source events that arrived before the plan was registered were dropped,
/// so every selected source is checked again; up-to-date mirrors cost no write.
#[instrument(skip(store, ctx, plan), fields(plan = %plan.name))]
pub async fn catch_up(
    store: &dyn ObjectStore,
    ctx: &ReconcileContext,
    plan: &PlanSnapshot,
) -> Result<usize> {
    sweep(store, ctx, plan, SweepMode::Reconcile).await
}

async fn sweep(
    store: &dyn ObjectStore,
    ctx: &ReconcileContext,
    plan: &PlanSnapshot,
    mode: SweepMode,
) -> Result<usize> {
    let namespaces = ctx.guard(store.list_namespaces()).await?;
    let mut tally = Tally::default();

    for namespace in namespaces {
        if plan.ignores(&namespace) || !is_valid_source_namespace(&namespace) {
            continue;
        }

        let secrets = match ctx.guard(store.list_secrets(&namespace)).await {
            Ok(secrets) => secrets,
            Err(e) => {
                tally.record(Err(e), &format!("namespace {}", namespace))?;
                continue;
            }
        };

        for source in secrets
            .iter()
            .filter(|s| s.name_any() == plan.source_name && is_mirrorable(s))
        {
            let res = match mode {
                SweepMode::Overwrite => {
                    create_or_replace(store, ctx, &plan.dest_namespace, source).await
                }
                SweepMode::Reconcile => {
                    let source_ref = SourceRef::new(namespace.as_str(), plan.source_name.as_str());
                    mirror_source(store, ctx, &plan.dest_namespace, &source_ref, Some(source))
                        .await
                        .map(|_| ())
                }
            };
            tally.record(res, &format!("{}/{}", namespace, plan.source_name))?;
        }
    }

    let total = tally.finish()?;
    info!(
        "Mirrored {} secrets named {} into {}",
        total, plan.source_name, plan.dest_namespace
    );
    Ok(total)
}

/// Bring existing mirrors in line with a plan whose criteria changed from `old` to `new`
#[instrument(skip(store, ctx, old, new), fields(plan = %new.name))]
pub async fn resync(
    store: &dyn ObjectStore,
    ctx: &ReconcileContext,
    old: &PlanSnapshot,
    new: &PlanSnapshot,
) -> Result<()> {
    let changes = old.changes_to(new);

    if changes.source_name || changes.dest_namespace {
        info!(
            "Plan moved from {}->{} to {}->{}, rebuilding mirrors",
            old.source_name, old.dest_namespace, new.source_name, new.dest_namespace
        );
        let selector = managed_source_selector(&old.source_name);
        ctx.guard(store.delete_secret_collection(&old.dest_namespace, &selector))
            .await?;
        full_sweep(store, ctx, new).await?;
        return Ok(());
    }

    if !changes.ignore_namespaces {
        return Ok(());
    }

    let mut tally = Tally::default();

    for namespace in new.ignore_namespaces.difference(&old.ignore_namespaces) {
        // No source: the table removes the mirror, and only if it is ours
        let source_ref = SourceRef::new(namespace.as_str(), new.source_name.as_str());
        let res = mirror_source(store, ctx, &new.dest_namespace, &source_ref, None)
            .await
            .map(|action| {
                if action == MirrorAction::Delete {
                    info!("Removed mirror of newly ignored namespace {}", namespace);
                }
            });
        tally.record(res, &format!("ignored namespace {}", namespace))?;
    }

    for namespace in old.ignore_namespaces.difference(&new.ignore_namespaces) {
        let source_ref = SourceRef::new(namespace.as_str(), new.source_name.as_str());
        let res = restore_mirror(store, ctx, &new.dest_namespace, &source_ref).await;
        tally.record(res, &format!("unignored namespace {}", namespace))?;
    }

    tally.finish().map(|_| ())
}

async fn restore_mirror(
    store: &dyn ObjectStore,
    ctx: &ReconcileContext,
    dest_namespace: &str,
    source_ref: &SourceRef,
) -> Result<()> {
    let source = ctx
        .guard(store.get_secret(&source_ref.namespace, &source_ref.name))
        .await?;

    if source.as_ref().is_some_and(|s| !is_mirrorable(s)) {
        warn!("Skipping managed secret {} as a source", source_ref);
        return Ok(());
    }

    mirror_source(store, ctx, dest_namespace, source_ref, source.as_ref())
        .await
        .map(|_| ())
}

/// Delete every managed secret in `namespace`
#[instrument(skip(store, ctx))]
pub async fn cleanup_namespace(
    store: &dyn ObjectStore,
    ctx: &ReconcileContext,
    namespace: &str,
) -> Result<()> {
    let selector = managed_selector();
    ctx.guard(store.delete_secret_collection(namespace, &selector))
        .await?;
    info!(
        "Deleted managed secrets in {} (selector {})",
        namespace, selector
    );
    Ok(())
}
