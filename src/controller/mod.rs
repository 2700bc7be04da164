//! # Controller
//!
//! Core controller modules for the AWS Private CA issuer.
//!
//! - `backoff`: Fibonacci backoff mechanism for retries
//! - `events`: Kubernetes Event publishing
//! - `reconciler`: CertificateRequest reconciliation logic
//! - `server`: HTTP server for health checks

pub mod backoff;
pub mod events;
pub mod reconciler;
pub mod server;
