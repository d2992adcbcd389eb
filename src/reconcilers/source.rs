// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Source reconciler - fans a source secret change out to every plan that selects it.

use crate::context::ReconcileContext;
use crate::error::{Result, RiggerError};
use crate::queue::ObjectEvent;
use crate::reconcilers::Reconcile;
use crate::registry::PlanRegistry;
use crate::store::ObjectStore;
use crate::sync::mirror::is_mirrorable;
use crate::sync::mirror_source;
use crate::types::naming::is_valid_source_namespace;
use crate::types::SourceRef;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

pub struct SourceReconciler {
    store: Arc<dyn ObjectStore>,
    registry: Arc<PlanRegistry>,
}

impl SourceReconciler {
    pub fn new(store: Arc<dyn ObjectStore>, registry: Arc<PlanRegistry>) -> Self {
        Self { store, registry }
    }
}

#[async_trait]
impl Reconcile for SourceReconciler {
    fn kind(&self) -> &'static str {
        "source"
    }

    #[instrument(skip(self, event, ctx), fields(source = %event.key))]
    async fn reconcile(&self, event: &ObjectEvent, ctx: &ReconcileContext) -> Result<()> {
        let namespace = event.key.namespace_or_default();
        let name = event.key.name.as_str();

        // Plans sharing a destination write the same object once
        let destinations: BTreeSet<String> = self
            .registry
            .snapshot()
            .iter()
            .filter(|plan| plan.selects(namespace, name))
            .map(|plan| plan.dest_namespace.clone())
            .collect();

        if destinations.is_empty() {
            debug!("No plan selects {}/{}", namespace, name);
            return Ok(());
        }

        if !is_valid_source_namespace(namespace) {
            warn!("Ignoring secret {}/{} in an unusable namespace", namespace, name);
            return Ok(());
        }

        let source = ctx.guard(self.store.get_secret(namespace, name)).await?;
        if source.as_ref().is_some_and(|s| !is_mirrorable(s)) {
            debug!("Secret {}/{} is itself a mirror, skipping", namespace, name);
            return Ok(());
        }

        let source_ref = SourceRef::new(namespace, name);
        let mut failed = 0;

        for dest_namespace in &destinations {
            match mirror_source(self.store.as_ref(), ctx, dest_namespace, &source_ref, source.as_ref()).await {
                Ok(action) => debug!("{} -> {}: {:?}", source_ref, dest_namespace, action),
                Err(e) if e.is_interrupted() => return Err(e),
                Err(e) => {
                    error!("Failed to mirror {} into {}: {}", source_ref, dest_namespace, e);
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(RiggerError::PartialSync {
                failed,
                total: destinations.len(),
            });
        }
        Ok(())
    }
}
