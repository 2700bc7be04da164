//! # Runtime
//!
//! Process-level plumbing around the reconciler.
//!
//! - `initialization.rs` - rustls, tracing, probe server, client and reconciler setup
//! - `watch_loop.rs` - kube-runtime controller over CertificateRequests
//! - `error_policy.rs` - per-resource backoff and watch stream error handling

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
