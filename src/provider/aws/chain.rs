//! # Certificate Chain Handling
//!
//! AWS Private CA returns the issued certificate and its chain separately. The
//! chain lists intermediates first and the root last. cert-manager wants the leaf
//! plus intermediates in `status.certificate` and the root alone in `status.ca`.

use crate::provider::{IssuedCertificate, ProvisionerError};
use pem::{EncodeConfig, LineEnding, Pem};

const CERTIFICATE_TAG: &str = "CERTIFICATE";

fn encode(block: &Pem) -> String {
    pem::encode_config(block, EncodeConfig::new().set_line_ending(LineEnding::LF))
}

fn certificates(bundle: &str, what: &str) -> Result<Vec<Pem>, ProvisionerError> {
    let blocks = pem::parse_many(bundle)
        .map_err(|e| ProvisionerError::Api(format!("{what} is not valid PEM: {e}")))?;
    Ok(blocks
        .into_iter()
        .filter(|block| block.tag() == CERTIFICATE_TAG)
        .collect())
}

/// Assemble the cert-manager view of an issued certificate
///
/// # Errors
///
/// Returns [`ProvisionerError::Api`] when either input is not PEM, the
/// certificate is missing or the chain holds no certificate.
pub fn assemble(certificate: &str, chain: &str) -> Result<IssuedCertificate, ProvisionerError> {
    let leaf = certificates(certificate, "issued certificate")?;
    let mut chain = certificates(chain, "certificate chain")?;

    let root = chain.pop().ok_or_else(|| {
        ProvisionerError::Api("certificate chain returned by the CA is empty".to_string())
    })?;
    if leaf.is_empty() {
        return Err(ProvisionerError::Api(
            "issued certificate holds no CERTIFICATE block".to_string(),
        ));
    }

    let bundle: String = leaf.iter().chain(chain.iter()).map(encode).collect();

    Ok(IssuedCertificate {
        certificate: bundle.into_bytes(),
        ca: encode(&root).into_bytes(),
    })
}
