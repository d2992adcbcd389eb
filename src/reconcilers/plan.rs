// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Plan reconciler - drives a plan through first sync, updates and deletion.

use crate::config::Config;
use crate::constants::PLAN_FINALIZER;
use crate::context::ReconcileContext;
use crate::error::{Result, RiggerError};
use crate::queue::ObjectEvent;
use crate::reconcilers::Reconcile;
use crate::registry::PlanRegistry;
use crate::store::ObjectStore;
use crate::sync::{catch_up, cleanup_namespace, full_sweep, resync};
use crate::types::naming::is_valid_source_namespace;
use crate::types::{Plan, PlanSnapshot, PlanStatus};
use async_trait::async_trait;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct PlanReconciler {
    store: Arc<dyn ObjectStore>,
    registry: Arc<PlanRegistry>,
    create_dest_namespace: bool,
}

impl PlanReconciler {
    pub fn new(store: Arc<dyn ObjectStore>, registry: Arc<PlanRegistry>, config: &Config) -> Self {
        Self {
            store,
            registry,
            create_dest_namespace: config.create_dest_namespace,
        }
    }

    /// The plan object is gone; clean up whatever the registry remembers of it
    async fn forget(&self, ctx: &ReconcileContext, name: &str) -> Result<()> {
        let Some(snapshot) = self.registry.delete(name) else {
            info!("Plan {} is gone and has no registered mirrors left", name);
            return Ok(());
        };

        if let Err(e) = cleanup_namespace(self.store.as_ref(), ctx, &snapshot.dest_namespace).await {
            // Keep the entry so the retry knows where to clean
            self.registry.store((*snapshot).clone());
            return Err(e);
        }

        info!(
            "Plan {} deleted, removed its mirrors from {}",
            name, snapshot.dest_namespace
        );
        Ok(())
    }

    /// The plan is being deleted; clean up and release the finalizer
    async fn finalize(&self, ctx: &ReconcileContext, plan: &Plan) -> Result<()> {
        let name = plan.name_any();
        self.registry.delete(&name);

        if !plan.has_finalizer() {
            debug!("Plan {} is being deleted without our finalizer", name);
            return Ok(());
        }

        let namespace = plan.cleanup_namespace();
        if is_valid_source_namespace(&namespace) {
            cleanup_namespace(self.store.as_ref(), ctx, &namespace).await?;
        } else {
            warn!(
                "Plan {} has no valid destination namespace '{}', nothing to clean up",
                name, namespace
            );
        }

        let remaining: Vec<String> = plan
            .finalizers()
            .iter()
            .filter(|f| f.as_str() != PLAN_FINALIZER)
            .cloned()
            .collect();

        match ctx
            .guard(self.store.set_plan_finalizers(plan, remaining))
            .await
        {
            Ok(_) | Err(RiggerError::NotFound(_)) => {
                info!("Plan {} cleaned up, finalizer removed", name);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn add_finalizer(&self, ctx: &ReconcileContext, plan: Plan) -> Result<Plan> {
        let mut finalizers = plan.finalizers().to_vec();
        finalizers.push(PLAN_FINALIZER.to_string());

        let updated = ctx
            .guard(self.store.set_plan_finalizers(&plan, finalizers))
            .await?;
        debug!("Added finalizer to plan {}", updated.name_any());
        Ok(updated)
    }

    async fn ensure_destination(&self, ctx: &ReconcileContext, namespace: &str) -> Result<()> {
        if self.create_dest_namespace {
            ctx.guard(self.store.ensure_namespace(namespace)).await?;
        }
        Ok(())
    }

    /// Record the spec as synced, then publish it to the registry
    async fn persist(&self, ctx: &ReconcileContext, mut plan: Plan, desired: PlanSnapshot) -> Result<()> {
        plan.status = Some(PlanStatus::from(&plan.spec));
        ctx.guard(self.store.update_plan_status(&plan)).await?;
        self.registry.store(desired);
        Ok(())
    }
}

#[async_trait]
impl Reconcile for PlanReconciler {
    fn kind(&self) -> &'static str {
        "plan"
    }

    #[instrument(skip(self, event, ctx), fields(plan = %event.key.name))]
    async fn reconcile(&self, event: &ObjectEvent, ctx: &ReconcileContext) -> Result<()> {
        let name = event.key.name.as_str();

        let Some(plan) = ctx.guard(self.store.get_plan(name)).await? else {
            return self.forget(ctx, name).await;
        };

        if plan.is_being_deleted() {
            return self.finalize(ctx, &plan).await;
        }

        plan.validate()?;

        let plan = if plan.has_finalizer() {
            plan
        } else {
            self.add_finalizer(ctx, plan).await?
        };

        let desired = plan.desired();

        let Some(last) = plan.last_synced() else {
            info!(
                "First sync of plan {}: mirroring {} into {}",
                name, desired.source_name, desired.dest_namespace
            );
            self.ensure_destination(ctx, &desired.dest_namespace).await?;
            full_sweep(self.store.as_ref(), ctx, &desired).await?;
            return self.persist(ctx, plan, desired).await;
        };

        let changes = last.changes_to(&desired);
        if !changes.any() {
            if self.registry.load(name).is_some() {
                debug!("Plan {} unchanged", name);
                self.registry.store(desired);
                return Ok(());
            }

            // Register first so source events racing the sweep are not dropped
            info!("Registering synced plan {}, catching up on missed sources", name);
            self.registry.store(desired.clone());
            if let Err(e) = catch_up(self.store.as_ref(), ctx, &desired).await {
                self.registry.delete(name);
                return Err(e);
            }
            return Ok(());
        }

        info!("Plan {} changed: {:?}", name, changes);
        if changes.dest_namespace {
            self.ensure_destination(ctx, &desired.dest_namespace).await?;
        }
        resync(self.store.as_ref(), ctx, &last, &desired).await?;
        self.persist(ctx, plan, desired).await
    }
}
