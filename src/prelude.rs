//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use aws_privateca_issuer::prelude::*;
//! ```
//!
//! This brings into scope:
//! - All CRD types (CertificateRequest, AwsPcaIssuer, AwsPcaClusterIssuer, etc.)
//! - Provisioner traits and the provisioner cache
//! - Reconciler types (Reconciler, ReconcilerError, Requeue, etc.)
//! - Config types (ControllerConfig, ServerConfig)

pub use crate::crd::*;

pub use crate::provider::{
    AuthorityKey, IssuedCertificate, Provisioner, ProvisionerCache, ProvisionerError,
    ProvisionerFactory,
};

pub use crate::controller::events::{EventPublisher, KubeEventPublisher, NoopEventPublisher};
pub use crate::controller::reconciler::{
    reconcile, reconcile_request, AuthorityStore, CertificateRequestStore, ReconcileOutcome,
    Reconciler, ReconcilerError, Requeue,
};

pub use crate::config::{ControllerConfig, ServerConfig};

pub use crate::provider::aws::{PcaProvisioner, PcaProvisionerFactory};
