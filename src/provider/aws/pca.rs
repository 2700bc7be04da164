//! # AWS Private CA Provisioner
//!
//! Issues certificates through `IssueCertificate` and collects them through
//! `GetCertificate`.

use crate::crd::{parse_go_duration, CertificateRequest, DEFAULT_CERTIFICATE_DURATION};
use crate::provider::aws::{chain, csr, template};
use crate::provider::{IssuedCertificate, Provisioner, ProvisionerError};
use async_trait::async_trait;
use aws_sdk_acmpca::error::DisplayErrorContext;
use aws_sdk_acmpca::primitives::Blob;
use aws_sdk_acmpca::types::{SigningAlgorithm, Validity, ValidityPeriodType};
use aws_sdk_acmpca::Client as AcmPcaClient;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info, info_span, Instrument};

/// Idempotency token sent with every IssueCertificate call
pub const IDEMPOTENCY_TOKEN: &str = "awspca";

/// Signing algorithm matching the CSR public key
#[must_use]
pub fn signing_algorithm(key: csr::KeyAlgorithm) -> SigningAlgorithm {
    match key {
        csr::KeyAlgorithm::Rsa => SigningAlgorithm::Sha256Withrsa,
        csr::KeyAlgorithm::EcdsaP256 => SigningAlgorithm::Sha256Withecdsa,
        csr::KeyAlgorithm::EcdsaP384 => SigningAlgorithm::Sha384Withecdsa,
        csr::KeyAlgorithm::EcdsaP521 => SigningAlgorithm::Sha512Withecdsa,
    }
}

/// Requested certificate lifetime, defaulting when `spec.duration` is unset
///
/// # Errors
///
/// Returns [`ProvisionerError::Configuration`] for an unparseable duration.
pub fn requested_duration(request: &CertificateRequest) -> Result<Duration, ProvisionerError> {
    match request.spec.duration.as_deref().filter(|d| !d.is_empty()) {
        Some(duration) => parse_go_duration(duration)
            .map_err(|e| ProvisionerError::Configuration(format!("spec.duration: {e}"))),
        None => Ok(DEFAULT_CERTIFICATE_DURATION),
    }
}

/// Absolute expiry (unix seconds) for a certificate issued at `now`
#[must_use]
pub fn validity_end(now: DateTime<Utc>, duration: Duration) -> i64 {
    let secs = i64::try_from(duration.as_secs()).unwrap_or(i64::MAX);
    now.timestamp().saturating_add(secs)
}

/// Provisioner bound to one AWS Private CA
pub struct PcaProvisioner {
    client: AcmPcaClient,
    ca_arn: String,
}

impl std::fmt::Debug for PcaProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcaProvisioner")
            .field("ca_arn", &self.ca_arn)
            .finish_non_exhaustive()
    }
}

impl PcaProvisioner {
    #[must_use]
    pub fn new(client: AcmPcaClient, ca_arn: String) -> Self {
        Self { client, ca_arn }
    }
}

#[async_trait]
impl Provisioner for PcaProvisioner {
    async fn sign(&self, request: &CertificateRequest) -> Result<String, ProvisionerError> {
        let span = info_span!(
            "pca.issue_certificate",
            ca.arn = %self.ca_arn,
            request.name = request.metadata.name.as_deref().unwrap_or_default()
        );

        async move {
            let csr_pem = request.csr_pem().map_err(|e| {
                ProvisionerError::Configuration(format!("spec.request is not valid base64: {e}"))
            })?;
            let key = csr::key_algorithm(&csr_pem)
                .map_err(|e| ProvisionerError::Configuration(e.to_string()))?;
            let usages = request.spec.usages.clone().unwrap_or_default();
            let template_arn = template::template_arn(&self.ca_arn, request.spec.is_ca, &usages);
            let duration = requested_duration(request)?;

            let validity = Validity::builder()
                .r#type(ValidityPeriodType::Absolute)
                .value(validity_end(Utc::now(), duration))
                .build()
                .map_err(|e| ProvisionerError::Configuration(e.to_string()))?;

            debug!(
                template = %template_arn,
                key_algorithm = ?key,
                validity_secs = duration.as_secs(),
                "Issuing certificate"
            );

            let output = self
                .client
                .issue_certificate()
                .certificate_authority_arn(&self.ca_arn)
                .csr(Blob::new(csr_pem))
                .signing_algorithm(signing_algorithm(key))
                .template_arn(template_arn)
                .validity(validity)
                .idempotency_token(IDEMPOTENCY_TOKEN)
                .send()
                .await
                .map_err(|e| ProvisionerError::Api(DisplayErrorContext(&e).to_string()))?;

            let certificate_arn = output
                .certificate_arn()
                .filter(|arn| !arn.is_empty())
                .ok_or_else(|| {
                    ProvisionerError::Api("IssueCertificate returned no certificate ARN".to_string())
                })?
                .to_string();

            info!(certificate.arn = %certificate_arn, "Certificate issuance requested");
            Ok(certificate_arn)
        }
        .instrument(span)
        .await
    }

    async fn get(
        &self,
        _request: &CertificateRequest,
        certificate_id: &str,
    ) -> Result<IssuedCertificate, ProvisionerError> {
        let output = self
            .client
            .get_certificate()
            .certificate_authority_arn(&self.ca_arn)
            .certificate_arn(certificate_id)
            .send()
            .await
            .map_err(|e| {
                if e
                    .as_service_error()
                    .is_some_and(|se| se.is_request_in_progress_exception())
                {
                    ProvisionerError::RequestInProgress
                } else {
                    ProvisionerError::Api(DisplayErrorContext(&e).to_string())
                }
            })?;

        let certificate = output.certificate().unwrap_or_default();
        if certificate.is_empty() {
            return Err(ProvisionerError::Api(format!(
                "GetCertificate returned no certificate for {certificate_id}"
            )));
        }

        debug!(certificate.arn = %certificate_id, "Retrieved issued certificate");
        chain::assemble(certificate, output.certificate_chain().unwrap_or_default())
    }
}
