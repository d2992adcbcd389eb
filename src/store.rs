// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Object store primitives the reconcilers are written against.

use crate::error::Result;
use crate::types::Plan;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;

/// Read/write access to secrets, namespaces and plans.
///
/// `create_secret` fails with `AlreadyExists`; `update_secret` and
/// `delete_secret` fail with `NotFound`. Getters return `None` for missing objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>>;

    async fn create_secret(&self, secret: &Secret) -> Result<Secret>;

    async fn update_secret(&self, secret: &Secret) -> Result<Secret>;

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<()>;

    async fn list_namespaces(&self) -> Result<Vec<String>>;

    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>>;

    /// Delete every secret in `namespace` matching `label_selector`
    async fn delete_secret_collection(&self, namespace: &str, label_selector: &str) -> Result<()>;

    async fn ensure_namespace(&self, namespace: &str) -> Result<()>;

    async fn get_plan(&self, name: &str) -> Result<Option<Plan>>;

    /// Persist `plan.status`
    async fn update_plan_status(&self, plan: &Plan) -> Result<Plan>;

    /// Replace the finalizers of `plan`, failing if it changed since it was read
    async fn set_plan_finalizers(&self, plan: &Plan, finalizers: Vec<String>) -> Result<Plan>;
}
