//! # Certificate Templates
//!
//! Maps the requested key usages onto an AWS Private CA certificate template.

/// Key usages cert-manager writes into `spec.usages` that select a template
pub mod usages {
    pub const CLIENT_AUTH: &str = "client auth";
    pub const SERVER_AUTH: &str = "server auth";
    pub const CODE_SIGNING: &str = "code signing";
    pub const OCSP_SIGNING: &str = "ocsp signing";
}

const SUBORDINATE_CA: &str = "acm-pca:::template/SubordinateCACertificate_PathLen0/V1";
const CODE_SIGNING: &str = "acm-pca:::template/CodeSigningCertificate/V1";
const CLIENT_AUTH: &str = "acm-pca:::template/EndEntityClientAuthCertificate/V1";
const SERVER_AUTH: &str = "acm-pca:::template/EndEntityServerAuthCertificate/V1";
const OCSP_SIGNING: &str = "acm-pca:::template/OCSPSigningCertificate/V1";
const END_ENTITY: &str = "acm-pca:::template/EndEntityCertificate/V1";
const CSR_PASSTHROUGH: &str = "acm-pca:::template/BlankEndEntityCertificate_APICSRPassthrough/V1";

/// `arn:<partition>:` prefix of the CA ARN, so templates resolve in aws-cn and aws-us-gov too
fn partition_prefix(ca_arn: &str) -> String {
    let mut parts = ca_arn.splitn(3, ':');
    match (parts.next(), parts.next()) {
        (Some(scheme), Some(partition)) if !partition.is_empty() => {
            format!("{scheme}:{partition}:")
        }
        _ => "arn:aws:".to_string(),
    }
}

/// Template ARN for a request
///
/// CA requests get a path-length-0 subordinate template. A single recognised usage
/// selects its dedicated template, client+server auth selects the generic end-entity
/// template, and everything else passes the CSR extensions through unchanged.
#[must_use]
pub fn template_arn(ca_arn: &str, is_ca: bool, requested: &[String]) -> String {
    let template = if is_ca {
        SUBORDINATE_CA
    } else {
        match requested {
            [only] => match only.as_str() {
                usages::CODE_SIGNING => CODE_SIGNING,
                usages::CLIENT_AUTH => CLIENT_AUTH,
                usages::SERVER_AUTH => SERVER_AUTH,
                usages::OCSP_SIGNING => OCSP_SIGNING,
                _ => CSR_PASSTHROUGH,
            },
            [first, second] => {
                let pair = (first.as_str(), second.as_str());
                if pair == (usages::CLIENT_AUTH, usages::SERVER_AUTH)
                    || pair == (usages::SERVER_AUTH, usages::CLIENT_AUTH)
                {
                    END_ENTITY
                } else {
                    CSR_PASSTHROUGH
                }
            }
            _ => CSR_PASSTHROUGH,
        }
    };
    format!("{}{}", partition_prefix(ca_arn), template)
}
