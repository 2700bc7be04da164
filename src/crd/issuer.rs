//! # AWSPCAIssuer / AWSPCAClusterIssuer
//!
//! Issuer CRDs binding cert-manager to one AWS Private CA.
//!
//! Both kinds share a spec; they differ only in scope.
//!
//! # Example
//!
//! ```yaml
//! apiVersion: awspca.cert-manager.io/v1beta1
//! kind: AWSPCAIssuer
//! metadata:
//!   name: issuer1
//!   namespace: ns1
//! spec:
//!   arn: arn:aws:acm-pca:us-east-1:123456789012:certificate-authority/12345678-1234-1234-1234-123456789012
//!   region: us-east-1
//!   secretRef:
//!     name: issuer1-credentials
//! ```

use crate::crd::status::{find_ready_condition, Condition, ConditionStatus};
use serde::{Deserialize, Serialize};

/// AWSPCAIssuer spec
#[derive(kube::CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "AWSPCAIssuer",
    root = "AwsPcaIssuer",
    group = "awspca.cert-manager.io",
    version = "v1beta1",
    namespaced,
    status = "crate::crd::AwsPcaIssuerStatus",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AwsPcaIssuerSpec {
    /// ARN of the AWS Private CA that signs requests for this issuer
    pub arn: String,
    /// AWS region of the CA. Falls back to the SDK default region when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Secret holding static AWS credentials. When unset the default credential
    /// chain (IRSA, instance profile) is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<AwsCredentialsSecretReference>,
}

/// AWSPCAClusterIssuer spec, identical to the namespaced issuer
#[derive(kube::CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "AWSPCAClusterIssuer",
    root = "AwsPcaClusterIssuer",
    group = "awspca.cert-manager.io",
    version = "v1beta1",
    status = "crate::crd::AwsPcaIssuerStatus",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
pub struct AwsPcaClusterIssuerSpec {
    #[serde(flatten)]
    pub config: AwsPcaIssuerSpec,
}

/// Reference to a Secret holding AWS credentials
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AwsCredentialsSecretReference {
    pub name: String,
    /// Defaults to the issuer namespace (or the controller namespace for cluster issuers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Key holding the access key id. Defaults to `AWS_ACCESS_KEY_ID`.
    #[serde(default, rename = "accessKeyIDSelector", skip_serializing_if = "Option::is_none")]
    pub access_key_id_selector: Option<SecretKeySelector>,
    /// Key holding the secret access key. Defaults to `AWS_SECRET_ACCESS_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key_selector: Option<SecretKeySelector>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct SecretKeySelector {
    pub key: String,
}

/// Issuer status, written by the issuer health controller
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AwsPcaIssuerStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl AwsPcaIssuerStatus {
    /// Ready condition is present and True
    #[must_use]
    pub fn is_ready(&self) -> bool {
        find_ready_condition(&self.conditions).is_some_and(|c| c.status == ConditionStatus::True)
    }
}

/// Issuer kinds a CertificateRequest may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssuerKind {
    /// Namespaced `AWSPCAIssuer`
    Issuer,
    /// Cluster-scoped `AWSPCAClusterIssuer`
    ClusterIssuer,
}

impl IssuerKind {
    pub const ISSUER: &'static str = "AWSPCAIssuer";
    pub const CLUSTER_ISSUER: &'static str = "AWSPCAClusterIssuer";

    /// Parse the `issuerRef.kind` of a request
    ///
    /// An empty kind means `AWSPCAIssuer`. The unprefixed `Issuer` / `ClusterIssuer`
    /// forms are accepted since the group already scopes the reference to us.
    #[must_use]
    pub fn from_ref_kind(kind: Option<&str>) -> Option<Self> {
        match kind.unwrap_or_default() {
            "" | Self::ISSUER | "Issuer" => Some(Self::Issuer),
            Self::CLUSTER_ISSUER | "ClusterIssuer" => Some(Self::ClusterIssuer),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            IssuerKind::Issuer => Self::ISSUER,
            IssuerKind::ClusterIssuer => Self::CLUSTER_ISSUER,
        }
    }
}

impl std::fmt::Display for IssuerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
