// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Object store backed by the Kubernetes API server

use crate::constants::OPERATOR_NAME;
use crate::error::{Result, RiggerError};
use crate::kubernetes::ensure_namespace_exists;
use crate::store::ObjectStore;
use crate::types::Plan;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::{
    api::{DeleteParams, ListParams, Patch, PatchParams, PostParams},
    Api, Client, ResourceExt,
};
use serde_json::json;
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn plans(&self) -> Api<Plan> {
        Api::all(self.client.clone())
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(OPERATOR_NAME.to_string()),
            ..Default::default()
        }
    }

    fn patch_params() -> PatchParams {
        PatchParams {
            field_manager: Some(OPERATOR_NAME.to_string()),
            ..Default::default()
        }
    }
}

/// Map API status codes onto the races the reconcilers handle explicitly
fn classify(err: kube::Error, object: String) -> RiggerError {
    match err {
        kube::Error::Api(ref ae) if ae.code == 404 => RiggerError::NotFound(object),
        kube::Error::Api(ref ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
            RiggerError::AlreadyExists(object)
        }
        other => RiggerError::KubeError(other),
    }
}

fn secret_key(secret: &Secret) -> (String, String) {
    (secret.namespace().unwrap_or_default(), secret.name_any())
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        Ok(self.secrets(namespace).get_opt(name).await?)
    }

    #[instrument(skip(self, secret), fields(secret = %format!("{}/{}", secret.namespace().unwrap_or_default(), secret.name_any())))]
    async fn create_secret(&self, secret: &Secret) -> Result<Secret> {
        let (namespace, name) = secret_key(secret);
        self.secrets(&namespace)
            .create(&Self::post_params(), secret)
            .await
            .map_err(|e| classify(e, format!("{}/{}", namespace, name)))
    }

    #[instrument(skip(self, secret), fields(secret = %format!("{}/{}", secret.namespace().unwrap_or_default(), secret.name_any())))]
    async fn update_secret(&self, secret: &Secret) -> Result<Secret> {
        let (namespace, name) = secret_key(secret);
        self.secrets(&namespace)
            .replace(&name, &Self::post_params(), secret)
            .await
            .map_err(|e| classify(e, format!("{}/{}", namespace, name)))
    }

    #[instrument(skip(self))]
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<()> {
        self.secrets(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| classify(e, format!("{}/{}", namespace, name)))
    }

    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let list = namespaces.list(&ListParams::default()).await?;

        Ok(list.items.iter().map(|ns| ns.name_any()).collect())
    }

    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>> {
        let list = self.secrets(namespace).list(&ListParams::default()).await?;
        Ok(list.items)
    }

    #[instrument(skip(self))]
    async fn delete_secret_collection(&self, namespace: &str, label_selector: &str) -> Result<()> {
        let lp = ListParams::default().labels(label_selector);
        self.secrets(namespace)
            .delete_collection(&DeleteParams::default(), &lp)
            .await?;
        debug!("Deleted secrets matching selector");
        Ok(())
    }

    async fn ensure_namespace(&self, namespace: &str) -> Result<()> {
        ensure_namespace_exists(&self.client, namespace).await
    }

    async fn get_plan(&self, name: &str) -> Result<Option<Plan>> {
        Ok(self.plans().get_opt(name).await?)
    }

    #[instrument(skip(self, plan), fields(plan = %plan.name_any()))]
    async fn update_plan_status(&self, plan: &Plan) -> Result<Plan> {
        let name = plan.name_any();
        let patch = json!({ "status": plan.status });
        self.plans()
            .patch_status(&name, &Self::patch_params(), &Patch::Merge(&patch))
            .await
            .map_err(|e| classify(e, format!("plan {}", name)))
    }

    #[instrument(skip(self, plan), fields(plan = %plan.name_any()))]
    async fn set_plan_finalizers(&self, plan: &Plan, finalizers: Vec<String>) -> Result<Plan> {
        let name = plan.name_any();
        let mut metadata = json!({ "finalizers": finalizers });
        // The API server rejects the patch with a conflict if the plan moved on
        if let Some(version) = plan.resource_version() {
            metadata["resourceVersion"] = json!(version);
        }

        self.plans()
            .patch(&name, &Self::patch_params(), &Patch::Merge(&json!({ "metadata": metadata })))
            .await
            .map_err(|e| classify(e, format!("plan {}", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{not_found_json, plan_json, secret_json, status_json, MockService};

    #[tokio::test]
    async fn test_get_secret_missing_is_none() {
        let store = KubeStore::new(MockService::new().into_client());

        let secret = store.get_secret("shared", "team-a.db-creds").await.unwrap();
        assert!(secret.is_none());
    }

    #[tokio::test]
    async fn test_get_secret_found() {
        let mock = MockService::new().on_get(
            "/api/v1/namespaces/team-a/secrets/db-creds",
            200,
            &secret_json("team-a", "db-creds"),
        );
        let store = KubeStore::new(mock.into_client());

        let secret = store.get_secret("team-a", "db-creds").await.unwrap().unwrap();
        assert_eq!(secret.name_any(), "db-creds");
        assert!(secret.data.unwrap().contains_key("password"));
    }

    #[tokio::test]
    async fn test_create_secret_conflict_is_already_exists() {
        let body = serde_json::json!({
            "kind": "Status",
            "apiVersion": "v1",
            "status": "Failure",
            "message": "secrets \"team-a.db-creds\" already exists",
            "reason": "AlreadyExists",
            "code": 409
        })
        .to_string();
        let mock = MockService::new().on_post("/api/v1/namespaces/shared/secrets", 409, &body);
        let store = KubeStore::new(mock.into_client());

        let secret: Secret = serde_json::from_str(&secret_json("shared", "team-a.db-creds")).unwrap();
        let err = store.create_secret(&secret).await.unwrap_err();
        assert!(matches!(err, RiggerError::AlreadyExists(ref o) if o == "shared/team-a.db-creds"));
    }

    #[tokio::test]
    async fn test_update_secret_missing_is_not_found() {
        let mock = MockService::new().on_put(
            "/api/v1/namespaces/shared/secrets/team-a.db-creds",
            404,
            &not_found_json("secrets", "team-a.db-creds"),
        );
        let store = KubeStore::new(mock.into_client());

        let secret: Secret = serde_json::from_str(&secret_json("shared", "team-a.db-creds")).unwrap();
        let err = store.update_secret(&secret).await.unwrap_err();
        assert!(matches!(err, RiggerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_secret_sends_delete() {
        let mock = MockService::new().on_delete(
            "/api/v1/namespaces/shared/secrets/team-a.db-creds",
            200,
            &status_json(),
        );
        let store = KubeStore::new(mock.clone().into_client());

        store.delete_secret("shared", "team-a.db-creds").await.unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "DELETE");
    }

    #[tokio::test]
    async fn test_delete_secret_collection_uses_selector() {
        let mock = MockService::new().on_delete(
            "/api/v1/namespaces/shared/secrets",
            200,
            &status_json(),
        );
        let store = KubeStore::new(mock.clone().into_client());

        store
            .delete_secret_collection("shared", "rigger.geeko.me/managed=true")
            .await
            .unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0]
            .query
            .contains("labelSelector=rigger.geeko.me%2Fmanaged%3Dtrue"));
    }

    #[tokio::test]
    async fn test_list_namespaces() {
        let body = serde_json::json!({
            "apiVersion": "v1",
            "kind": "NamespaceList",
            "metadata": {},
            "items": [
                { "apiVersion": "v1", "kind": "Namespace", "metadata": { "name": "team-a" } },
                { "apiVersion": "v1", "kind": "Namespace", "metadata": { "name": "kube-system" } }
            ]
        })
        .to_string();
        let mock = MockService::new().on_get("/api/v1/namespaces", 200, &body);
        let store = KubeStore::new(mock.into_client());

        let namespaces = store.list_namespaces().await.unwrap();
        assert_eq!(namespaces, vec!["team-a".to_string(), "kube-system".to_string()]);
    }

    #[tokio::test]
    async fn test_set_plan_finalizers_is_guarded_by_resource_version() {
        let conflict = serde_json::json!({
            "kind": "Status",
            "apiVersion": "v1",
            "status": "Failure",
            "message": "the object has been modified",
            "reason": "Conflict",
            "code": 409
        })
        .to_string();
        let mock = MockService::new().on_patch(
            "/apis/rigger.geeko.me/v1beta1/plans/db-creds-plan",
            409,
            &conflict,
        );
        let store = KubeStore::new(mock.clone().into_client());

        let mut plan: Plan = serde_json::from_str(&plan_json("db-creds-plan")).unwrap();
        plan.metadata.resource_version = Some("42".to_string());
        let err = store
            .set_plan_finalizers(&plan, vec!["rigger.geeko.me/cleanup".to_string()])
            .await
            .unwrap_err();

        // A conflict is retried, not mistaken for a benign race
        assert!(matches!(err, RiggerError::KubeError(_)));
        let body: serde_json::Value = serde_json::from_slice(&mock.requests()[0].body).unwrap();
        assert_eq!(body["metadata"]["resourceVersion"], "42");
        assert_eq!(body["metadata"]["finalizers"][0], "rigger.geeko.me/cleanup");
    }

    #[tokio::test]
    async fn test_update_plan_status_patches_status_subresource() {
        let mock = MockService::new().on_patch(
            "/apis/rigger.geeko.me/v1beta1/plans/db-creds-plan/status",
            200,
            &plan_json("db-creds-plan"),
        );
        let store = KubeStore::new(mock.clone().into_client());

        let plan: Plan = serde_json::from_str(&plan_json("db-creds-plan")).unwrap();
        store.update_plan_status(&plan).await.unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["status"]["lastSourceName"], "db-creds");
    }
}
