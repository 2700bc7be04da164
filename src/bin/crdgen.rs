//! # CRD Generator
//!
//! Generates the issuer CustomResourceDefinitions as YAML.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/awspca-issuers.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```
//!
//! CertificateRequest is owned by cert-manager and is not emitted.

use aws_privateca_issuer::crd::{AwsPcaClusterIssuer, AwsPcaIssuer};
use kube::core::CustomResourceExt;

fn main() {
    let crds = [AwsPcaIssuer::crd(), AwsPcaClusterIssuer::crd()];

    println!("# This file is auto-generated by crdgen");
    println!("# DO NOT EDIT THIS FILE MANUALLY");
    for crd in &crds {
        match serde_yaml::to_string(crd) {
            Ok(yaml) => {
                println!("---");
                print!("{yaml}");
            }
            Err(e) => {
                eprintln!("Failed to serialize CRD to YAML: {e}");
                std::process::exit(1);
            }
        }
    }
}
