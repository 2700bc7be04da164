//! # Authority Resolution
//!
//! Resolves the issuer a CertificateRequest points at. `AWSPCAIssuer` is looked
//! up in the request's namespace, `AWSPCAClusterIssuer` cluster-wide.

use crate::controller::reconciler::store::AuthorityStore;
use crate::controller::reconciler::types::ReconcilerError;
use crate::crd::{AwsPcaClusterIssuer, AwsPcaIssuer, AwsPcaIssuerSpec, CertificateRequest, IssuerKind};
use crate::provider::AuthorityKey;
use anyhow::Context;
use kube::ResourceExt;

/// A resolved issuer of either scope
#[derive(Debug, Clone)]
pub enum Authority {
    Issuer(AwsPcaIssuer),
    ClusterIssuer(AwsPcaClusterIssuer),
}

impl Authority {
    #[must_use]
    pub fn kind(&self) -> IssuerKind {
        match self {
            Authority::Issuer(_) => IssuerKind::Issuer,
            Authority::ClusterIssuer(_) => IssuerKind::ClusterIssuer,
        }
    }

    #[must_use]
    pub fn namespace(&self) -> Option<String> {
        match self {
            Authority::Issuer(issuer) => issuer.namespace(),
            Authority::ClusterIssuer(_) => None,
        }
    }

    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Authority::Issuer(issuer) => issuer.name_any(),
            Authority::ClusterIssuer(issuer) => issuer.name_any(),
        }
    }

    #[must_use]
    pub fn spec(&self) -> &AwsPcaIssuerSpec {
        match self {
            Authority::Issuer(issuer) => &issuer.spec,
            Authority::ClusterIssuer(issuer) => &issuer.spec.config,
        }
    }

    /// Ready condition is True
    #[must_use]
    pub fn is_ready(&self) -> bool {
        let status = match self {
            Authority::Issuer(issuer) => issuer.status.as_ref(),
            Authority::ClusterIssuer(issuer) => issuer.status.as_ref(),
        };
        status.is_some_and(|s| s.is_ready())
    }

    /// Provisioner cache key
    #[must_use]
    pub fn key(&self) -> AuthorityKey {
        AuthorityKey {
            kind: self.kind(),
            namespace: self.namespace(),
            name: self.name(),
        }
    }
}

/// Cache key the request's issuer reference resolves to
///
/// # Errors
///
/// Returns [`ReconcilerError::UnknownIssuerKind`] for kinds this issuer does not serve.
pub fn authority_key(request: &CertificateRequest) -> Result<AuthorityKey, ReconcilerError> {
    let issuer_ref = &request.spec.issuer_ref;
    let kind = IssuerKind::from_ref_kind(issuer_ref.kind.as_deref()).ok_or_else(|| {
        ReconcilerError::UnknownIssuerKind(issuer_ref.kind.clone().unwrap_or_default())
    })?;

    Ok(match kind {
        IssuerKind::Issuer => AuthorityKey::issuer(
            request.metadata.namespace.as_deref().unwrap_or_default(),
            &issuer_ref.name,
        ),
        IssuerKind::ClusterIssuer => AuthorityKey::cluster_issuer(&issuer_ref.name),
    })
}

/// Load the authority for a request and check it is Ready
///
/// # Errors
///
/// - [`ReconcilerError::UnknownIssuerKind`] when the reference kind is not ours
/// - [`ReconcilerError::AuthorityNotFound`] when the issuer does not exist
/// - [`ReconcilerError::AuthorityNotReady`] when it exists but is not Ready
/// - [`ReconcilerError::ReconciliationFailed`] when the lookup itself fails
pub async fn resolve(
    store: &dyn AuthorityStore,
    request: &CertificateRequest,
) -> Result<Authority, ReconcilerError> {
    let key = authority_key(request)?;

    let authority = match (&key.kind, key.namespace.as_deref()) {
        (IssuerKind::Issuer, Some(namespace)) => store
            .get_issuer(namespace, &key.name)
            .await
            .with_context(|| format!("Failed to load {key}"))?
            .map(Authority::Issuer),
        _ => store
            .get_cluster_issuer(&key.name)
            .await
            .with_context(|| format!("Failed to load {key}"))?
            .map(Authority::ClusterIssuer),
    };

    let authority = authority.ok_or_else(|| ReconcilerError::AuthorityNotFound(key.clone()))?;
    if !authority.is_ready() {
        return Err(ReconcilerError::AuthorityNotReady(key));
    }
    Ok(authority)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{CertificateRequestSpec, IssuerRef};

    fn request(kind: Option<&str>) -> CertificateRequest {
        let mut request = CertificateRequest::new(
            "cr1",
            CertificateRequestSpec {
                issuer_ref: IssuerRef {
                    name: "issuer1".to_string(),
                    kind: kind.map(str::to_string),
                    group: None,
                },
                ..Default::default()
            },
        );
        request.metadata.namespace = Some("ns1".to_string());
        request
    }

    #[test]
    fn test_authority_key_scopes() {
        assert_eq!(
            authority_key(&request(None)).unwrap(),
            AuthorityKey::issuer("ns1", "issuer1")
        );
        assert_eq!(
            authority_key(&request(Some("AWSPCAClusterIssuer"))).unwrap(),
            AuthorityKey::cluster_issuer("issuer1")
        );
        assert!(matches!(
            authority_key(&request(Some("VaultIssuer"))),
            Err(ReconcilerError::UnknownIssuerKind(kind)) if kind == "VaultIssuer"
        ));
    }

    #[test]
    fn test_cluster_authority_has_no_namespace() {
        let mut issuer = AwsPcaClusterIssuer::new("clusterissuer1", Default::default());
        issuer.metadata.namespace = Some("ignored".to_string());
        let authority = Authority::ClusterIssuer(issuer);
        assert_eq!(authority.key(), AuthorityKey::cluster_issuer("clusterissuer1"));
        assert!(!authority.is_ready());
    }
}
