//! # CSR Inspection
//!
//! Picks the signing algorithm from the public key carried by a PEM CSR.
//!
//! The request is decoded with `pem` and parsed with `x509-parser`; the
//! SubjectPublicKeyInfo algorithm (and the named curve for EC keys) decides
//! between the RSA and ECDSA signing algorithms AWS Private CA offers.

use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::prelude::FromDer;

const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_PRIME256V1: &str = "1.2.840.10045.3.1.7";
const OID_SECP384R1: &str = "1.3.132.0.34";
const OID_SECP521R1: &str = "1.3.132.0.35";

/// PEM labels accepted for a certificate request (`NEW` is the legacy Netscape form)
const CSR_PEM_TAGS: [&str; 2] = ["CERTIFICATE REQUEST", "NEW CERTIFICATE REQUEST"];

/// Public key algorithm of a CSR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Rsa,
    EcdsaP256,
    EcdsaP384,
    EcdsaP521,
}

/// Reasons a CSR cannot be inspected
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CsrError {
    #[error("request is not a PEM encoded certificate request: {0}")]
    NotPem(String),
    #[error("certificate request is not valid DER: {0}")]
    InvalidDer(String),
    #[error("unsupported public key algorithm {0} in certificate request")]
    UnsupportedKeyAlgorithm(String),
}

/// DER bytes of a PEM certificate request
pub fn pem_to_der(pem: &[u8]) -> Result<Vec<u8>, CsrError> {
    let block = pem::parse(pem).map_err(|e| CsrError::NotPem(e.to_string()))?;
    if !CSR_PEM_TAGS.contains(&block.tag()) {
        return Err(CsrError::NotPem(format!("unexpected PEM label {}", block.tag())));
    }
    Ok(block.into_contents())
}

/// Detect the public key algorithm of a PEM CSR
pub fn key_algorithm(pem: &[u8]) -> Result<KeyAlgorithm, CsrError> {
    let der = pem_to_der(pem)?;
    let (_, request) = X509CertificationRequest::from_der(&der)
        .map_err(|e| CsrError::InvalidDer(e.to_string()))?;

    let algorithm = &request.certification_request_info.subject_pki.algorithm;
    let key_oid = algorithm.algorithm.to_id_string();

    match key_oid.as_str() {
        OID_RSA_ENCRYPTION => Ok(KeyAlgorithm::Rsa),
        OID_EC_PUBLIC_KEY => {
            let curve = algorithm
                .parameters
                .as_ref()
                .and_then(|params| params.as_oid().ok())
                .map(|oid| oid.to_id_string())
                .unwrap_or_default();
            match curve.as_str() {
                OID_PRIME256V1 => Ok(KeyAlgorithm::EcdsaP256),
                OID_SECP384R1 => Ok(KeyAlgorithm::EcdsaP384),
                OID_SECP521R1 => Ok(KeyAlgorithm::EcdsaP521),
                _ => Err(CsrError::UnsupportedKeyAlgorithm(format!("EC curve {curve}"))),
            }
        }
        _ => Err(CsrError::UnsupportedKeyAlgorithm(key_oid)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSA: &str = include_str!("../../../tests/fixtures/csr/rsa.csr");
    const P256: &str = include_str!("../../../tests/fixtures/csr/p256.csr");
    const P384: &str = include_str!("../../../tests/fixtures/csr/p384.csr");
    const P521: &str = include_str!("../../../tests/fixtures/csr/p521.csr");
    const ED25519: &str = include_str!("../../../tests/fixtures/csr/ed25519.csr");

    #[test]
    fn test_detects_rsa() {
        assert_eq!(key_algorithm(RSA.as_bytes()), Ok(KeyAlgorithm::Rsa));
    }

    #[test]
    fn test_detects_ecdsa_curves() {
        assert_eq!(key_algorithm(P256.as_bytes()), Ok(KeyAlgorithm::EcdsaP256));
        assert_eq!(key_algorithm(P384.as_bytes()), Ok(KeyAlgorithm::EcdsaP384));
        assert_eq!(key_algorithm(P521.as_bytes()), Ok(KeyAlgorithm::EcdsaP521));
    }

    #[test]
    fn test_accepts_legacy_new_certificate_request_label() {
        let legacy = RSA.replace("CERTIFICATE REQUEST", "NEW CERTIFICATE REQUEST");
        assert_eq!(key_algorithm(legacy.as_bytes()), Ok(KeyAlgorithm::Rsa));
    }

    #[test]
    fn test_rejects_unsupported_keys() {
        assert!(matches!(
            key_algorithm(ED25519.as_bytes()),
            Err(CsrError::UnsupportedKeyAlgorithm(oid)) if oid == "1.3.101.112"
        ));
    }

    #[test]
    fn test_rejects_other_pem_blocks_and_garbage() {
        let certificate = RSA.replace("CERTIFICATE REQUEST", "CERTIFICATE");
        assert!(matches!(key_algorithm(certificate.as_bytes()), Err(CsrError::NotPem(_))));
        assert!(matches!(key_algorithm(b"not a csr"), Err(CsrError::NotPem(_))));

        let truncated = pem::encode(&pem::Pem::new("CERTIFICATE REQUEST", vec![0x30, 0x03, 0x02]));
        assert!(matches!(
            key_algorithm(truncated.as_bytes()),
            Err(CsrError::InvalidDer(_))
        ));
    }
}
