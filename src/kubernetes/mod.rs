// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for CRD discovery, watching, namespace management and the object store.

pub mod crd;
pub mod namespaces;
pub mod store;
pub mod watch;

pub use crd::wait_for_plan_crd;
pub use namespaces::ensure_namespace_exists;
pub use store::KubeStore;
pub use watch::{watch_plans, watch_secrets};
