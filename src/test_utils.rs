// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: a mock Kubernetes API and an in-memory object store.

use crate::error::{Result, RiggerError};
use crate::store::ObjectStore;
use crate::types::{Plan, PlanSpec};
use async_trait::async_trait;
use http::{Request, Response};
use http_body_util::BodyExt;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::{Client, ResourceExt};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

/// A request received by the MockService
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: String,
    pub body: Vec<u8>,
}

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a response for requests with `method` matching the exact path
    pub fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    pub fn on_post(self, path: &str, status: u16, body: &str) -> Self {
        self.on("POST", path, status, body)
    }

    pub fn on_put(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PUT", path, status, body)
    }

    pub fn on_patch(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PATCH", path, status, body)
    }

    pub fn on_delete(self, path: &str, status: u16, body: &str) -> Self {
        self.on("DELETE", path, status, body)
    }

    /// Requests received so far, in arrival order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        self.responses
            .lock()
            .unwrap()
            .get(&(method.to_string(), path.to_string()))
            .cloned()
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let query = req.uri().query().unwrap_or_default().to_string();

        let response = self.find_response(&method, &path);
        let requests = Arc::clone(&self.requests);

        Box::pin(async move {
            let body = req.into_body().collect().await?.to_bytes().to_vec();
            requests.lock().unwrap().push(RecordedRequest {
                method,
                path,
                query,
                body,
            });

            let (status, body) = response.unwrap_or_else(|| (404, not_found_json("object", "unknown")));
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))?)
        })
    }
}

/// Create a mock namespace JSON response
pub fn namespace_json(name: &str) -> String {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "uid": "test-uid"
        }
    })
    .to_string()
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

/// Create a success Status response, as returned by deletes
pub fn status_json() -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Success",
        "code": 200
    })
    .to_string()
}

/// Create a mock secret JSON response with a single `password` key
pub fn secret_json(namespace: &str, name: &str) -> String {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Secret",
        "metadata": {
            "name": name,
            "namespace": namespace
        },
        "type": "Opaque",
        "data": { "password": "aHVudGVyMg==" }
    })
    .to_string()
}

/// Create a mock synced plan JSON response
pub fn plan_json(name: &str) -> String {
    serde_json::json!({
        "apiVersion": "rigger.geeko.me/v1beta1",
        "kind": "Plan",
        "metadata": { "name": name },
        "spec": {
            "sourceName": "db-creds",
            "destNamespace": "shared",
            "ignoreNamespaces": ["kube-system"]
        },
        "status": {
            "lastSourceName": "db-creds",
            "lastDestNamespace": "shared",
            "lastIgnoreNamespaces": ["kube-system"]
        }
    })
    .to_string()
}

pub fn make_secret(namespace: &str, name: &str, password: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            "password".to_string(),
            ByteString(password.as_bytes().to_vec()),
        )])),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    }
}

pub fn make_plan(name: &str, source_name: &str, dest_namespace: &str, ignore: &[&str]) -> Plan {
    Plan::new(
        name,
        PlanSpec {
            source_name: source_name.to_string(),
            dest_namespace: dest_namespace.to_string(),
            ignore_namespaces: ignore.iter().map(|s| s.to_string()).collect(),
        },
    )
}

#[derive(Default)]
struct MemoryState {
    namespaces: BTreeSet<String>,
    secrets: BTreeMap<(String, String), Secret>,
    plans: BTreeMap<String, Plan>,
    writes: usize,
    failing: HashSet<String>,
}

/// In-memory ObjectStore with Kubernetes-like error semantics
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_namespace(&self, namespace: &str) {
        self.state.lock().unwrap().namespaces.insert(namespace.to_string());
    }

    /// Insert or overwrite a secret without counting it as a write
    pub fn put_secret(&self, secret: Secret) {
        let mut state = self.state.lock().unwrap();
        let namespace = secret.namespace().unwrap_or_default();
        state.namespaces.insert(namespace.clone());
        state.secrets.insert((namespace, secret.name_any()), secret);
    }

    pub fn remove_secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.state
            .lock()
            .unwrap()
            .secrets
            .remove(&(namespace.to_string(), name.to_string()))
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.state
            .lock()
            .unwrap()
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Sorted names of the secrets in a namespace
    pub fn secret_names(&self, namespace: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .secrets
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn put_plan(&self, plan: Plan) {
        self.state.lock().unwrap().plans.insert(plan.name_any(), plan);
    }

    pub fn plan(&self, name: &str) -> Option<Plan> {
        self.state.lock().unwrap().plans.get(name).cloned()
    }

    pub fn remove_plan(&self, name: &str) -> Option<Plan> {
        self.state.lock().unwrap().plans.remove(name)
    }

    /// Number of successful secret creates, updates and deletes
    pub fn writes(&self) -> usize {
        self.state.lock().unwrap().writes
    }

    /// Make every write to secrets named `name` fail with a server error
    pub fn fail_writes_for(&self, name: &str) {
        self.state.lock().unwrap().failing.insert(name.to_string());
    }

    fn check_failure(state: &MemoryState, name: &str) -> Result<()> {
        if state.failing.contains(name) {
            return Err(RiggerError::KubeError(kube::Error::Api(kube::core::ErrorResponse {
                status: "Failure".to_string(),
                message: format!("injected failure for {}", name),
                reason: "InternalError".to_string(),
                code: 500,
            })));
        }
        Ok(())
    }
}

fn matches_selector(secret: &Secret, selector: &str) -> bool {
    let labels = secret.labels();
    selector
        .split(',')
        .filter_map(|term| term.split_once('='))
        .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        Ok(self.secret(namespace, name))
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret> {
        let mut state = self.state.lock().unwrap();
        let key = (secret.namespace().unwrap_or_default(), secret.name_any());
        Self::check_failure(&state, &key.1)?;
        if state.secrets.contains_key(&key) {
            return Err(RiggerError::AlreadyExists(format!("{}/{}", key.0, key.1)));
        }
        state.namespaces.insert(key.0.clone());
        state.secrets.insert(key, secret.clone());
        state.writes += 1;
        Ok(secret.clone())
    }

    async fn update_secret(&self, secret: &Secret) -> Result<Secret> {
        let mut state = self.state.lock().unwrap();
        let key = (secret.namespace().unwrap_or_default(), secret.name_any());
        Self::check_failure(&state, &key.1)?;
        if !state.secrets.contains_key(&key) {
            return Err(RiggerError::NotFound(format!("{}/{}", key.0, key.1)));
        }
        state.secrets.insert(key, secret.clone());
        state.writes += 1;
        Ok(secret.clone())
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::check_failure(&state, name)?;
        match state.secrets.remove(&(namespace.to_string(), name.to_string())) {
            Some(_) => {
                state.writes += 1;
                Ok(())
            }
            None => Err(RiggerError::NotFound(format!("{}/{}", namespace, name))),
        }
    }

    async fn list_namespaces(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().namespaces.iter().cloned().collect())
    }

    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .secrets
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, s)| s.clone())
            .collect())
    }

    async fn delete_secret_collection(&self, namespace: &str, label_selector: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .secrets
            .retain(|(ns, _), s| ns != namespace || !matches_selector(s, label_selector));
        Ok(())
    }

    async fn ensure_namespace(&self, namespace: &str) -> Result<()> {
        self.add_namespace(namespace);
        Ok(())
    }

    async fn get_plan(&self, name: &str) -> Result<Option<Plan>> {
        Ok(self.plan(name))
    }

    async fn update_plan_status(&self, plan: &Plan) -> Result<Plan> {
        let mut state = self.state.lock().unwrap();
        let name = plan.name_any();
        let stored = state
            .plans
            .get_mut(&name)
            .ok_or_else(|| RiggerError::NotFound(format!("plan {}", name)))?;
        stored.status = plan.status.clone();
        Ok(stored.clone())
    }

    async fn set_plan_finalizers(&self, plan: &Plan, finalizers: Vec<String>) -> Result<Plan> {
        let mut state = self.state.lock().unwrap();
        let name = plan.name_any();
        let stored = state
            .plans
            .get_mut(&name)
            .ok_or_else(|| RiggerError::NotFound(format!("plan {}", name)))?;
        if plan.resource_version().is_some() && plan.resource_version() != stored.resource_version() {
            return Err(RiggerError::KubeError(kube::Error::Api(kube::core::ErrorResponse {
                status: "Failure".to_string(),
                message: format!("plan {} has been modified", name),
                reason: "Conflict".to_string(),
                code: 409,
            })));
        }
        stored.metadata.finalizers = Some(finalizers);
        let updated = stored.clone();

        // The API server drops a deleted object once its last finalizer is gone
        if updated.metadata.deletion_timestamp.is_some() && updated.finalizers().is_empty() {
            state.plans.remove(&name);
        }
        Ok(updated)
    }
}
