// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Deciding and applying the write that brings a mirrored secret in line with its source

use crate::context::ReconcileContext;
use crate::error::{Result, RiggerError};
use crate::store::ObjectStore;
use crate::types::labels::{is_managed, provenance_labels};
use crate::types::{DestinationName, SourceRef};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::{api::ObjectMeta, ResourceExt};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorAction {
    Create,
    Update,
    Delete,
    Noop,
}

/// Pick the write for a (source, destination) pair.
///
/// A destination without the managed label is never deleted.
pub fn decide(source: Option<&Secret>, destination: Option<&Secret>) -> MirrorAction {
    match (source, destination) {
        (Some(_), None) => MirrorAction::Create,
        (Some(src), Some(dst)) if data_equal(src, dst) => MirrorAction::Noop,
        (Some(_), Some(_)) => MirrorAction::Update,
        (None, Some(dst)) if is_managed(dst) => MirrorAction::Delete,
        (None, Some(_)) | (None, None) => MirrorAction::Noop,
    }
}

/// Byte comparison of the data maps; a missing map equals an empty one
pub fn data_equal(a: &Secret, b: &Secret) -> bool {
    static EMPTY: BTreeMap<String, ByteString> = BTreeMap::new();
    a.data.as_ref().unwrap_or(&EMPTY) == b.data.as_ref().unwrap_or(&EMPTY)
}

/// Build the mirrored copy of `source` for `dest_namespace`
pub fn build_destination(dest_namespace: &str, source: &Secret) -> Secret {
    let source_ref = SourceRef::new(source.namespace().unwrap_or_default(), source.name_any());

    Secret {
        metadata: ObjectMeta {
            name: Some(source_ref.destination_name().to_string()),
            namespace: Some(dest_namespace.to_string()),
            labels: Some(provenance_labels(&source_ref)),
            ..Default::default()
        },
        data: source.data.clone(),
        type_: source.type_.clone(),
        ..Default::default()
    }
}

/// Apply the decision table for one mirrored secret.
///
/// Creates that find the object already present and updates or deletes that find
/// it gone are races with another event and count as success.
#[instrument(skip(store, ctx, source, destination), fields(destination = %format!("{}/{}", dest_namespace, dest_name)))]
pub async fn apply(
    store: &dyn ObjectStore,
    ctx: &ReconcileContext,
    dest_namespace: &str,
    dest_name: &DestinationName,
    source: Option<&Secret>,
    destination: Option<&Secret>,
) -> Result<MirrorAction> {
    let action = decide(source, destination);

    let res = match (action, source) {
        (MirrorAction::Create, Some(src)) => ctx
            .guard(store.create_secret(&build_destination(dest_namespace, src)))
            .await
            .map(|_| ()),
        (MirrorAction::Update, Some(src)) => ctx
            .guard(store.update_secret(&build_destination(dest_namespace, src)))
            .await
            .map(|_| ()),
        (MirrorAction::Delete, _) => {
            ctx.guard(store.delete_secret(dest_namespace, dest_name.as_str()))
                .await
        }
        _ => {
            debug!("Destination already up to date");
            return Ok(MirrorAction::Noop);
        }
    };

    match res {
        Ok(()) => {
            info!("Mirror {:?} succeeded", action);
            Ok(action)
        }
        Err(e) if e.is_benign_race() => {
            info!("Mirror {:?} raced with another change: {}", action, e);
            Ok(action)
        }
        Err(e) => Err(e),
    }
}

/// Fetch the destination for `source_ref` and apply the decision table against `source`
pub async fn mirror_source(
    store: &dyn ObjectStore,
    ctx: &ReconcileContext,
    dest_namespace: &str,
    source_ref: &SourceRef,
    source: Option<&Secret>,
) -> Result<MirrorAction> {
    let dest_name = source_ref.destination_name();
    let destination = ctx
        .guard(store.get_secret(dest_namespace, dest_name.as_str()))
        .await?;

    apply(store, ctx, dest_namespace, &dest_name, source, destination.as_ref()).await
}

/// Create the mirrored copy of `source`, overwriting whatever holds its name
pub async fn create_or_replace(
    store: &dyn ObjectStore,
    ctx: &ReconcileContext,
    dest_namespace: &str,
    source: &Secret,
) -> Result<()> {
    let destination = build_destination(dest_namespace, source);
    let name = destination.name_any();

    match ctx.guard(store.create_secret(&destination)).await {
        Ok(_) => {
            info!("Created secret {}/{}", dest_namespace, name);
            Ok(())
        }
        Err(RiggerError::AlreadyExists(_)) => {
            ctx.guard(store.update_secret(&destination)).await?;
            info!("Overwrote existing secret {}/{}", dest_namespace, name);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Check if a secret can be mirrored at all
pub fn is_mirrorable(source: &Secret) -> bool {
    !is_managed(source)
}
