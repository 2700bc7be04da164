//! AWS Private CA Issuer Library
//!
//! A cert-manager external issuer that signs CertificateRequests with AWS Private CA.
//!
//! ## Quick Start
//!
//! ```rust
//! use aws_privateca_issuer::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod prelude;
pub mod provider;
pub mod runtime;
