//! # Provisioners
//!
//! A provisioner performs the two calls the issuance protocol needs against one
//! certificate authority:
//!
//! 1. `sign` submits the CSR and returns the identifier the CA assigned to the
//!    certificate it is going to issue
//! 2. `get` fetches the issued certificate and chain for that identifier
//!
//! Issuance is asynchronous on the CA side, so `get` may report that the request
//! is still in progress. That is the only error class callers distinguish.

use crate::crd::{AwsPcaIssuerSpec, CertificateRequest};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub mod aws;
pub mod cache;

pub use cache::{AuthorityKey, ProvisionerCache};

/// Errors surfaced by provisioners and their factories
#[derive(Debug, Error)]
pub enum ProvisionerError {
    /// The CA accepted the request but has not finished issuing the certificate
    #[error("certificate issuance is still in progress")]
    RequestInProgress,
    /// The issuer or request cannot be turned into a valid CA call
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// Any other failure reported by the CA or the transport
    #[error("{0}")]
    Api(String),
}

impl ProvisionerError {
    /// Whether the CA is still processing the request (retry by polling)
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        matches!(self, ProvisionerError::RequestInProgress)
    }
}

/// Certificate material returned by a successful `get`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    /// Leaf certificate followed by intermediates (PEM)
    pub certificate: Vec<u8>,
    /// Root CA certificate (PEM)
    pub ca: Vec<u8>,
}

/// Capability object bound to one CA configuration
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Submit the request's CSR to the CA
    ///
    /// Returns the CA-assigned certificate identifier to pass to `get` later.
    async fn sign(&self, request: &CertificateRequest) -> Result<String, ProvisionerError>;

    /// Fetch the issued certificate for a previously signed request
    async fn get(
        &self,
        request: &CertificateRequest,
        certificate_id: &str,
    ) -> Result<IssuedCertificate, ProvisionerError>;
}

/// Builds provisioners for an authority
///
/// Construction may exchange credentials and set up regional clients, so callers
/// go through [`ProvisionerCache`] instead of calling this per request.
#[async_trait]
pub trait ProvisionerFactory: Send + Sync {
    async fn build(
        &self,
        key: &AuthorityKey,
        spec: &AwsPcaIssuerSpec,
    ) -> Result<Arc<dyn Provisioner>, ProvisionerError>;
}
