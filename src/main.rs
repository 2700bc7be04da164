//! # AWS Private CA Issuer
//!
//! A cert-manager external issuer backed by AWS Private CA.
//!
//! ## Overview
//!
//! The controller watches cert-manager `CertificateRequest` resources that reference an
//! `AWSPCAIssuer` or `AWSPCAClusterIssuer` and drives each one through issuance:
//!
//! 1. **Sign** - submits the CSR with `IssueCertificate` and records the returned
//!    certificate ARN on the request
//! 2. **Get** - polls `GetCertificate` until AWS Private CA has issued the certificate,
//!    then stores the certificate and CA chain in the request status
//!
//! ## Features
//!
//! - **Namespaced and cluster issuers** with static credentials from a Secret or IRSA
//! - **Provisioner cache** reusing one AWS client per issuer
//! - **Kubernetes Events** for every status change
//! - **Health probes** on `/healthz` and `/readyz`

use aws_privateca_issuer::runtime::{initialization::initialize, watch_loop::run_watch_loop};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let init = initialize().await?;

    run_watch_loop(init.requests, init.reconciler, init.server_state).await
}
