// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{labels, PLAN_FINALIZER};
use crate::error::{Result, RiggerError};
use crate::types::naming::is_valid_source_namespace;
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Mirrors the secret named `sourceName` from every namespace into `destNamespace`
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "rigger.geeko.me", version = "v1beta1", kind = "Plan")]
#[kube(status = "PlanStatus")]
#[kube(printcolumn = r#"{"name":"Source","type":"string","jsonPath":".spec.sourceName"}"#)]
#[kube(printcolumn = r#"{"name":"Destination","type":"string","jsonPath":".spec.destNamespace"}"#)]
#[serde(rename_all = "camelCase")]
pub struct PlanSpec {
    /// Name of the secret to mirror
    pub source_name: String,
    /// Namespace receiving the mirrored secrets
    pub dest_namespace: String,
    /// Namespaces never mirrored from
    #[serde(default)]
    pub ignore_namespaces: Vec<String>,
}

/// Spec values as of the last completed reconcile.
///
/// Every field is always serialized so a status merge patch can clear a list.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanStatus {
    #[serde(default)]
    pub last_source_name: String,
    #[serde(default)]
    pub last_dest_namespace: String,
    #[serde(default)]
    pub last_ignore_namespaces: Vec<String>,
}

impl PlanStatus {
    pub fn is_empty(&self) -> bool {
        self.last_source_name.is_empty()
            && self.last_dest_namespace.is_empty()
            && self.last_ignore_namespaces.is_empty()
    }
}

impl From<&PlanSpec> for PlanStatus {
    fn from(spec: &PlanSpec) -> Self {
        PlanStatus {
            last_source_name: spec.source_name.clone(),
            last_dest_namespace: spec.dest_namespace.clone(),
            last_ignore_namespaces: spec.ignore_namespaces.clone(),
        }
    }
}

/// Which match criteria differ between the last synced status and the spec
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanChanges {
    pub source_name: bool,
    pub dest_namespace: bool,
    pub ignore_namespaces: bool,
}

impl PlanChanges {
    pub fn any(&self) -> bool {
        self.source_name || self.dest_namespace || self.ignore_namespaces
    }
}

impl Plan {
    /// Check if this plan has completed at least one reconcile
    pub fn is_synced(&self) -> bool {
        self.status.as_ref().is_some_and(|s| !s.is_empty())
    }

    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self) -> bool {
        self.finalizers().iter().any(|f| f == PLAN_FINALIZER)
    }

    /// Criteria from the last completed reconcile, if any
    pub fn last_synced(&self) -> Option<PlanSnapshot> {
        let status = self.status.as_ref().filter(|s| !s.is_empty())?;
        Some(PlanSnapshot {
            name: self.name_any(),
            source_name: status.last_source_name.clone(),
            dest_namespace: status.last_dest_namespace.clone(),
            ignore_namespaces: status.last_ignore_namespaces.iter().cloned().collect(),
        })
    }

    /// Criteria currently requested by the spec
    pub fn desired(&self) -> PlanSnapshot {
        PlanSnapshot {
            name: self.name_any(),
            source_name: self.spec.source_name.clone(),
            dest_namespace: self.spec.dest_namespace.clone(),
            ignore_namespaces: self.spec.ignore_namespaces.iter().cloned().collect(),
        }
    }

    /// Compare the spec against the last synced status
    pub fn changes(&self) -> PlanChanges {
        match self.last_synced() {
            Some(last) => last.changes_to(&self.desired()),
            None => PlanChanges {
                source_name: true,
                dest_namespace: true,
                ignore_namespaces: true,
            },
        }
    }

    /// Namespace holding the secrets this plan has mirrored
    pub fn cleanup_namespace(&self) -> String {
        self.last_synced()
            .map(|s| s.dest_namespace)
            .unwrap_or_else(|| self.spec.dest_namespace.clone())
    }

    pub fn validate(&self) -> Result<()> {
        let name = self.name_any();
        if self.spec.source_name.is_empty() {
            return Err(RiggerError::InvalidPlan(format!(
                "plan {} has an empty sourceName",
                name
            )));
        }
        // The source name is recorded as a label value on every mirror
        if self.spec.source_name.len() > labels::MAX_VALUE_LEN {
            return Err(RiggerError::InvalidPlan(format!(
                "plan {} has a sourceName longer than {} characters",
                name,
                labels::MAX_VALUE_LEN
            )));
        }
        if !is_valid_source_namespace(&self.spec.dest_namespace) {
            return Err(RiggerError::InvalidPlan(format!(
                "plan {} has an invalid destNamespace '{}'",
                name, self.spec.dest_namespace
            )));
        }
        Ok(())
    }
}

/// Effective match criteria of a plan, as cached in the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSnapshot {
    pub name: String,
    pub source_name: String,
    pub dest_namespace: String,
    pub ignore_namespaces: BTreeSet<String>,
}

impl PlanSnapshot {
    pub fn ignores(&self, namespace: &str) -> bool {
        self.ignore_namespaces.contains(namespace)
    }

    /// Check if the secret `namespace/name` is mirrored by this plan
    pub fn selects(&self, namespace: &str, name: &str) -> bool {
        name == self.source_name && !self.ignores(namespace)
    }

    pub fn changes_to(&self, other: &PlanSnapshot) -> PlanChanges {
        PlanChanges {
            source_name: self.source_name != other.source_name,
            dest_namespace: self.dest_namespace != other.dest_namespace,
            ignore_namespaces: self.ignore_namespaces != other.ignore_namespaces,
        }
    }
}
