//! # Custom Resource Definitions
//!
//! Kubernetes resource types used by the issuer.
//!
//! ## Module Structure
//!
//! - `certificate_request.rs` - cert-manager CertificateRequest (read and status-patched)
//! - `issuer.rs` - AWSPCAIssuer and AWSPCAClusterIssuer CRDs owned by this project
//! - `status.rs` - Condition types shared by both
//! - `duration.rs` - Go duration parsing for `spec.duration`

mod certificate_request;
mod duration;
mod issuer;
mod status;

/// API group of the issuer CRDs
pub const ISSUER_GROUP: &str = "awspca.cert-manager.io";

pub use certificate_request::{
    CertificateRequest, CertificateRequestSpec, CertificateRequestStatus, IssuerRef,
    CERTIFICATE_ARN_ANNOTATION,
};
pub use duration::{parse_go_duration, DEFAULT_CERTIFICATE_DURATION};
pub use issuer::{
    AwsCredentialsSecretReference, AwsPcaClusterIssuer, AwsPcaClusterIssuerSpec, AwsPcaIssuer,
    AwsPcaIssuerSpec, AwsPcaIssuerStatus, IssuerKind, SecretKeySelector,
};
pub use status::{find_ready_condition, reasons, Condition, ConditionStatus, CONDITION_READY};
