//! # Stores
//!
//! Read and write access to the resources the reconciler works on.
//!
//! The reconciler only talks to these traits, so the state machine can be driven
//! against in-memory fakes. [`KubeStore`] is the API server implementation.

use crate::crd::{
    AwsPcaClusterIssuer, AwsPcaIssuer, CertificateRequest, CertificateRequestStatus, Condition,
    CERTIFICATE_ARN_ANNOTATION,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, Resource};
use tracing::debug;

/// CertificateRequest access
#[async_trait]
pub trait CertificateRequestStore: Send + Sync {
    /// Load a request. `Ok(None)` when it no longer exists.
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<CertificateRequest>>;

    /// Persist the CA-assigned certificate ARN on the request
    async fn set_certificate_arn(&self, request: &CertificateRequest, arn: &str) -> Result<()>;

    /// Apply the Ready condition and the issuance payload of `status`
    ///
    /// Conditions of any other type belong to other controllers (e.g. the
    /// approver's `Approved`/`Denied`) and must be left as they are on the server.
    async fn patch_status(
        &self,
        request: &CertificateRequest,
        status: &CertificateRequestStatus,
    ) -> Result<()>;
}

/// Issuer access (read-only)
#[async_trait]
pub trait AuthorityStore: Send + Sync {
    async fn get_issuer(&self, namespace: &str, name: &str) -> Result<Option<AwsPcaIssuer>>;

    async fn get_cluster_issuer(&self, name: &str) -> Result<Option<AwsPcaClusterIssuer>>;
}

/// Stores backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    field_manager: String,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore")
            .field("field_manager", &self.field_manager)
            .finish_non_exhaustive()
    }
}

impl KubeStore {
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn requests(&self, namespace: &str) -> Api<CertificateRequest> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn patch_params(&self) -> PatchParams {
        PatchParams::apply(&self.field_manager)
    }
}

/// The part of a status this controller owns
///
/// cert-manager declares `status.conditions` as a list map keyed by `type`, so
/// applying only the Ready entry leaves the other conditions to their managers.
#[must_use]
pub fn owned_status(status: &CertificateRequestStatus) -> CertificateRequestStatus {
    CertificateRequestStatus {
        conditions: status
            .conditions
            .iter()
            .filter(|c| c.is_ready_type())
            .cloned()
            .collect::<Vec<Condition>>(),
        certificate: status.certificate.clone(),
        ca: status.ca.clone(),
        failure_time: status.failure_time.clone(),
    }
}

/// Server-side apply body for the status subresource
#[must_use]
pub fn status_apply_patch(status: &CertificateRequestStatus) -> serde_json::Value {
    serde_json::json!({
        "apiVersion": CertificateRequest::api_version(&()),
        "kind": CertificateRequest::kind(&()),
        "status": owned_status(status),
    })
}

fn identity(request: &CertificateRequest) -> Result<(&str, &str)> {
    let name = request
        .metadata
        .name
        .as_deref()
        .context("CertificateRequest has no name")?;
    let namespace = request
        .metadata
        .namespace
        .as_deref()
        .context("CertificateRequest has no namespace")?;
    Ok((namespace, name))
}

#[async_trait]
impl CertificateRequestStore for KubeStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<CertificateRequest>> {
        self.requests(namespace)
            .get_opt(name)
            .await
            .with_context(|| format!("Failed to get CertificateRequest {namespace}/{name}"))
    }

    async fn set_certificate_arn(&self, request: &CertificateRequest, arn: &str) -> Result<()> {
        let (namespace, name) = identity(request)?;
        let patch = serde_json::json!({
            "metadata": {
                "annotations": {
                    (CERTIFICATE_ARN_ANNOTATION): arn
                }
            }
        });

        self.requests(namespace)
            .patch(name, &self.patch_params(), &Patch::Merge(patch))
            .await
            .with_context(|| {
                format!("Failed to annotate CertificateRequest {namespace}/{name} with certificate ARN")
            })?;

        debug!(resource.namespace = namespace, resource.name = name, "Persisted certificate ARN");
        Ok(())
    }

    async fn patch_status(
        &self,
        request: &CertificateRequest,
        status: &CertificateRequestStatus,
    ) -> Result<()> {
        let (namespace, name) = identity(request)?;
        let patch = status_apply_patch(status);

        // Force takes over the Ready condition if another manager last wrote it
        self.requests(namespace)
            .patch_status(name, &self.patch_params().force(), &Patch::Apply(patch))
            .await
            .with_context(|| format!("Failed to update status of CertificateRequest {namespace}/{name}"))?;

        Ok(())
    }
}

#[async_trait]
impl AuthorityStore for KubeStore {
    async fn get_issuer(&self, namespace: &str, name: &str) -> Result<Option<AwsPcaIssuer>> {
        let api: Api<AwsPcaIssuer> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name)
            .await
            .with_context(|| format!("Failed to get AWSPCAIssuer {namespace}/{name}"))
    }

    async fn get_cluster_issuer(&self, name: &str) -> Result<Option<AwsPcaClusterIssuer>> {
        let api: Api<AwsPcaClusterIssuer> = Api::all(self.client.clone());
        api.get_opt(name)
            .await
            .with_context(|| format!("Failed to get AWSPCAClusterIssuer {name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{reasons, ConditionStatus};
    use std::sync::Arc;

    #[test]
    fn test_owned_status_drops_foreign_conditions() {
        let approved = Condition {
            r#type: "Approved".to_string(),
            ..Condition::ready(ConditionStatus::True, "cert-manager.io", "approved")
        };
        let status = CertificateRequestStatus {
            conditions: vec![
                approved,
                Condition::ready(ConditionStatus::False, reasons::PENDING, "issuing"),
            ],
            certificate: None,
            ca: None,
            failure_time: None,
        };

        let owned = owned_status(&status);
        assert_eq!(owned.conditions.len(), 1);
        assert!(owned.conditions[0].is_ready_type());
        assert_eq!(owned.conditions[0].reason.as_deref(), Some(reasons::PENDING));
    }

    #[test]
    fn test_status_apply_patch_identifies_the_resource() {
        let status = CertificateRequestStatus {
            conditions: vec![Condition::ready(ConditionStatus::True, reasons::ISSUED, "done")],
            certificate: Some("Y2VydA==".to_string()),
            ca: Some("Y2FjZXJ0".to_string()),
            failure_time: None,
        };
        let patch = status_apply_patch(&status);

        assert_eq!(patch["apiVersion"], "cert-manager.io/v1");
        assert_eq!(patch["kind"], "CertificateRequest");
        assert_eq!(patch["status"]["conditions"][0]["type"], "Ready");
        assert_eq!(patch["status"]["certificate"], "Y2VydA==");
        assert!(patch["status"].get("failureTime").is_none());
    }

    #[tokio::test]
    async fn test_kube_store_serves_both_store_traits() {
        // Mirror runtime initialization: a TLS-capable client needs a process crypto provider
        let _ = rustls::crypto::ring::default_provider().install_default();
        let config = kube::Config::new("http://127.0.0.1:6443".parse().unwrap());
        let client = Client::try_from(config).unwrap();
        let store = Arc::new(KubeStore::new(client, "aws-privateca-issuer"));

        let requests: Arc<dyn CertificateRequestStore> = Arc::<KubeStore>::clone(&store);
        let authorities: Arc<dyn AuthorityStore> = store;
        assert_eq!(Arc::strong_count(&requests), 2);
        drop(authorities);
        assert_eq!(Arc::strong_count(&requests), 1);
    }
}
