//! # CertificateRequest
//!
//! Mirror of cert-manager's `cert-manager.io/v1` CertificateRequest.
//!
//! Only the fields this issuer reads or writes are modelled. The type is owned by
//! cert-manager, so it is never emitted by `crdgen`.

use crate::crd::status::{find_ready_condition, reasons, Condition, ConditionStatus};
use crate::crd::ISSUER_GROUP;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Annotation holding the certificate ARN assigned by AWS Private CA after a successful sign
pub const CERTIFICATE_ARN_ANNOTATION: &str = "aws-privateca-issuer/certificate-arn";

/// CertificateRequest spec as written by cert-manager
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "CertificateRequest",
    group = "cert-manager.io",
    version = "v1",
    namespaced,
    status = "crate::crd::CertificateRequestStatus",
    shortname = "cr"
)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequestSpec {
    /// PEM encoded x509 certificate signing request, base64 encoded on the wire
    pub request: String,
    /// Reference to the issuer responsible for this request
    pub issuer_ref: IssuerRef,
    /// Requested certificate lifetime as a Go duration string (e.g. "2160h0m0s")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// Requested key usages (e.g. "server auth", "client auth")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usages: Option<Vec<String>>,
    /// Request a CA certificate
    #[serde(default, rename = "isCA")]
    pub is_ca: bool,
}

/// Reference to an issuer resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuerRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// CertificateRequest status
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequestStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Signed certificate followed by any intermediates, base64 encoded PEM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
    /// Root CA certificate, base64 encoded PEM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<String>,
    /// Time the request was marked Failed (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_time: Option<String>,
}

impl CertificateRequest {
    /// The Ready condition, if the request has one
    #[must_use]
    pub fn ready_condition(&self) -> Option<&Condition> {
        self.status
            .as_ref()
            .and_then(|s| find_ready_condition(&s.conditions))
    }

    fn has_ready(&self, status: ConditionStatus, reason: &str) -> bool {
        self.ready_condition()
            .is_some_and(|c| c.status == status && c.reason.as_deref() == Some(reason))
    }

    /// Ready=True with reason Issued
    #[must_use]
    pub fn is_issued(&self) -> bool {
        self.has_ready(ConditionStatus::True, reasons::ISSUED)
    }

    /// Ready=False with reason Failed
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.has_ready(ConditionStatus::False, reasons::FAILED)
    }

    /// Whether this request targets an issuer in our API group
    ///
    /// An empty group is cert-manager's default and is treated as ours.
    #[must_use]
    pub fn targets_this_issuer(&self) -> bool {
        match self.spec.issuer_ref.group.as_deref() {
            None | Some("") => true,
            Some(group) => group == ISSUER_GROUP,
        }
    }

    /// Certificate ARN persisted after a successful sign
    #[must_use]
    pub fn certificate_arn(&self) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(CERTIFICATE_ARN_ANNOTATION))
            .map(String::as_str)
            .filter(|arn| !arn.is_empty())
    }

    /// Decoded CSR bytes (PEM)
    ///
    /// # Errors
    ///
    /// Returns an error if `spec.request` is not valid base64.
    pub fn csr_pem(&self) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(self.spec.request.trim())
    }
}
