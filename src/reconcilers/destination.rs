// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Destination reconciler - restores mirrored secrets that drifted from their source.

use crate::context::ReconcileContext;
use crate::error::Result;
use crate::queue::ObjectEvent;
use crate::reconcilers::Reconcile;
use crate::registry::PlanRegistry;
use crate::store::ObjectStore;
use crate::sync::apply;
use crate::sync::mirror::is_mirrorable;
use crate::types::labels::{is_managed, source_of};
use crate::types::naming::is_valid_source_namespace;
use crate::types::{DestinationName, SourceRef};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub struct DestinationReconciler {
    store: Arc<dyn ObjectStore>,
    registry: Arc<PlanRegistry>,
}

impl DestinationReconciler {
    pub fn new(store: Arc<dyn ObjectStore>, registry: Arc<PlanRegistry>) -> Self {
        Self { store, registry }
    }

    /// Work out which source a destination object belongs to, if any
    fn resolve(
        &self,
        dest_namespace: &str,
        dest_name: &DestinationName,
        destination: Option<&Secret>,
    ) -> Option<SourceRef> {
        match destination {
            Some(dst) if !is_managed(dst) => {
                debug!("{}/{} is not managed by us", dest_namespace, dest_name);
                None
            }
            Some(dst) => source_of(dst),
            None => {
                let source_ref = dest_name.decode()?;
                let plan = self.registry.find(|plan| {
                    plan.dest_namespace == dest_namespace
                        && plan.selects(&source_ref.namespace, &source_ref.name)
                });
                match plan {
                    Some(plan) => {
                        debug!("{}/{} belongs to plan {}", dest_namespace, dest_name, plan.name);
                        Some(source_ref)
                    }
                    None => None,
                }
            }
        }
    }
}

#[async_trait]
impl Reconcile for DestinationReconciler {
    fn kind(&self) -> &'static str {
        "destination"
    }

    #[instrument(skip(self, event, ctx), fields(destination = %event.key))]
    async fn reconcile(&self, event: &ObjectEvent, ctx: &ReconcileContext) -> Result<()> {
        let dest_namespace = event.key.namespace_or_default();
        let dest_name = DestinationName::from(event.key.name.as_str());

        let destination = ctx
            .guard(self.store.get_secret(dest_namespace, dest_name.as_str()))
            .await?;

        let Some(source_ref) = self.resolve(dest_namespace, &dest_name, destination.as_ref()) else {
            return Ok(());
        };

        if source_ref.destination_name() != dest_name {
            warn!(
                "{}/{} claims to mirror {} but does not carry its name, leaving it alone",
                dest_namespace, dest_name, source_ref
            );
            return Ok(());
        }

        if !is_valid_source_namespace(&source_ref.namespace) {
            warn!("{}/{} points at an unusable source {}", dest_namespace, dest_name, source_ref);
            return Ok(());
        }

        let source = ctx
            .guard(self.store.get_secret(&source_ref.namespace, &source_ref.name))
            .await?
            .filter(is_mirrorable);

        apply(
            self.store.as_ref(),
            ctx,
            dest_namespace,
            &dest_name,
            source.as_ref(),
            destination.as_ref(),
        )
        .await?;
        Ok(())
    }
}
