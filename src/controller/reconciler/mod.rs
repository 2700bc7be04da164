//! # Reconciler
//!
//! Drives CertificateRequests through AWS Private CA issuance.
//!
//! ## Module Structure
//!
//! - `types.rs` - Reconciler context, errors and requeue directives
//! - `store.rs` - Request and issuer access (Kubernetes API or fakes)
//! - `authority.rs` - Issuer resolution and readiness
//! - `status.rs` - Status projection
//! - `reconcile.rs` - The sign-then-get state machine

pub mod authority;
pub mod reconcile;
pub mod status;
pub mod store;
pub mod types;

pub use authority::Authority;
pub use reconcile::{reconcile, reconcile_request};
pub use status::StatusUpdate;
pub use store::{owned_status, AuthorityStore, CertificateRequestStore, KubeStore};
pub use types::{BackoffState, ReconcileOutcome, Reconciler, ReconcilerError, Requeue};
