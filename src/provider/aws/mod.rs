//! # AWS Private CA
//!
//! Provisioner implementation backed by AWS Private CA.
//!
//! - `auth.rs` - SDK configuration and credential resolution
//! - `pca.rs` - IssueCertificate / GetCertificate provisioner
//! - `csr.rs` - CSR public key detection
//! - `template.rs` - certificate template selection
//! - `chain.rs` - certificate chain splitting

pub mod auth;
pub mod chain;
pub mod csr;
pub mod pca;
pub mod template;

pub use pca::PcaProvisioner;

use crate::crd::AwsPcaIssuerSpec;
use crate::provider::{AuthorityKey, Provisioner, ProvisionerError, ProvisionerFactory};
use async_trait::async_trait;
use aws_sdk_acmpca::Client as AcmPcaClient;
use std::sync::Arc;
use tracing::info;

/// Builds [`PcaProvisioner`]s from issuer specs
pub struct PcaProvisionerFactory {
    client: kube::Client,
    controller_namespace: String,
}

impl std::fmt::Debug for PcaProvisionerFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcaProvisionerFactory")
            .field("controller_namespace", &self.controller_namespace)
            .finish_non_exhaustive()
    }
}

impl PcaProvisionerFactory {
    pub fn new(client: kube::Client, controller_namespace: impl Into<String>) -> Self {
        Self {
            client,
            controller_namespace: controller_namespace.into(),
        }
    }
}

#[async_trait]
impl ProvisionerFactory for PcaProvisionerFactory {
    async fn build(
        &self,
        key: &AuthorityKey,
        spec: &AwsPcaIssuerSpec,
    ) -> Result<Arc<dyn Provisioner>, ProvisionerError> {
        if spec.arn.trim().is_empty() {
            return Err(ProvisionerError::Configuration(format!(
                "{key} has no CA arn configured"
            )));
        }

        let sdk_config =
            auth::create_sdk_config(&self.client, key, spec, &self.controller_namespace).await?;
        if sdk_config.region().is_none() {
            return Err(ProvisionerError::Configuration(format!(
                "{key} has no region and no default AWS region is configured"
            )));
        }

        info!(
            authority = %key,
            ca.arn = %spec.arn,
            region = sdk_config.region().map(ToString::to_string).unwrap_or_default(),
            "Created AWS Private CA client"
        );
        Ok(Arc::new(PcaProvisioner::new(
            AcmPcaClient::new(&sdk_config),
            spec.arn.clone(),
        )))
    }
}
