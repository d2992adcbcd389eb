// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Provenance labels carried by mirrored secrets.

use crate::constants::labels;
use crate::types::naming::{DestinationName, SourceRef};
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Labels marking a secret as managed and naming its source
pub fn provenance_labels(source: &SourceRef) -> BTreeMap<String, String> {
    BTreeMap::from([
        (labels::MANAGED.to_string(), labels::MANAGED_VALUE.to_string()),
        (labels::SOURCE_NAMESPACE.to_string(), source.namespace.clone()),
        (labels::SOURCE_NAME.to_string(), source.name.clone()),
    ])
}

/// Selector matching every managed secret in a namespace
pub fn managed_selector() -> String {
    format!("{}={}", labels::MANAGED, labels::MANAGED_VALUE)
}

/// Selector matching managed secrets mirrored from sources with the given name
pub fn managed_source_selector(source_name: &str) -> String {
    format!("{},{}={}", managed_selector(), labels::SOURCE_NAME, source_name)
}

/// Check if a secret carries the managed label
pub fn is_managed(secret: &Secret) -> bool {
    secret
        .labels()
        .get(labels::MANAGED)
        .is_some_and(|v| v == labels::MANAGED_VALUE)
}

/// Source coordinates of a managed secret.
///
/// Reads the provenance labels and falls back to decoding the secret's name.
pub fn source_of(secret: &Secret) -> Option<SourceRef> {
    if !is_managed(secret) {
        return None;
    }

    let secret_labels = secret.labels();
    match (
        secret_labels.get(labels::SOURCE_NAMESPACE),
        secret_labels.get(labels::SOURCE_NAME),
    ) {
        (Some(namespace), Some(name)) if !namespace.is_empty() && !name.is_empty() => {
            Some(SourceRef::new(namespace.as_str(), name.as_str()))
        }
        _ => DestinationName::from(secret.name_any()).decode(),
    }
}
