// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Naming of mirrored secrets.
//!
//! A mirrored secret is named `<source namespace>.<source name>`. Namespace names
//! are DNS-1123 labels and never contain the separator, so splitting on its first
//! occurrence recovers the source exactly, even when the source name has dots.

use std::fmt;

/// Separator between the source namespace and source name
pub const SEPARATOR: char = '.';

/// Coordinates of a source secret
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRef {
    pub namespace: String,
    pub name: String,
}

impl SourceRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn destination_name(&self) -> DestinationName {
        DestinationName::encode(&self.namespace, &self.name)
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Name of a mirrored secret in a plan's destination namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationName(String);

impl DestinationName {
    pub fn encode(source_namespace: &str, source_name: &str) -> Self {
        Self(format!("{}{}{}", source_namespace, SEPARATOR, source_name))
    }

    /// Recover the source coordinates, `None` if this is not a derived name
    pub fn decode(&self) -> Option<SourceRef> {
        let (namespace, name) = self.0.split_once(SEPARATOR)?;
        if namespace.is_empty() || name.is_empty() {
            return None;
        }
        Some(SourceRef::new(namespace, name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DestinationName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&str> for DestinationName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl fmt::Display for DestinationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a namespace can take part in the naming scheme without ambiguity
pub fn is_valid_source_namespace(namespace: &str) -> bool {
    !namespace.is_empty() && !namespace.contains(SEPARATOR)
}
