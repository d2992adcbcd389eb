// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// API group of the Plan custom resource
pub const API_GROUP: &str = "rigger.geeko.me";

/// Kubernetes label keys placed on mirrored secrets
pub mod labels {
    /// Marks a secret as created and owned by Rigger
    pub const MANAGED: &str = "rigger.geeko.me/managed";
    pub const MANAGED_VALUE: &str = "true";
    /// Namespace of the secret this one was mirrored from
    pub const SOURCE_NAMESPACE: &str = "rigger.geeko.me/src-namespace";
    /// Name of the secret this one was mirrored from
    pub const SOURCE_NAME: &str = "rigger.geeko.me/src-name";
    /// Longest value Kubernetes accepts for a label
    pub const MAX_VALUE_LEN: usize = 63;
}

/// Field manager name used for writes
pub const OPERATOR_NAME: &str = "rigger";

/// Finalizer holding a Plan until its mirrored secrets are cleaned up
pub const PLAN_FINALIZER: &str = "rigger.geeko.me/cleanup";

/// CRD polling configuration
pub mod crd {
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}
