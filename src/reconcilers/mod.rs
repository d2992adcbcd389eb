// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Reconcilers that react to watch events.
//!
//! Each reconciler is an independent state machine driven by its own work queue.
//! They share nothing but the plan registry.

pub mod destination;
pub mod plan;
pub mod source;

pub use destination::DestinationReconciler;
pub use plan::PlanReconciler;
pub use source::SourceReconciler;

use crate::context::ReconcileContext;
use crate::error::Result;
use crate::queue::ObjectEvent;
use async_trait::async_trait;

/// Drives the object named by an event toward its desired state
#[async_trait]
pub trait Reconcile: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn reconcile(&self, event: &ObjectEvent, ctx: &ReconcileContext) -> Result<()>;
}
