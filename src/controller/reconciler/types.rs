//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::events::EventPublisher;
use crate::controller::reconciler::store::{AuthorityStore, CertificateRequestStore};
use crate::provider::{AuthorityKey, ProvisionerCache, ProvisionerError};
use kube_runtime::controller::Action;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("issuer kind {0:?} is not supported")]
    UnknownIssuerKind(String),
    #[error("{0} not found")]
    AuthorityNotFound(AuthorityKey),
    #[error("{0} is not ready")]
    AuthorityNotReady(AuthorityKey),
    #[error("failed to create provisioner: {0}")]
    Provisioner(#[source] ProvisionerError),
    #[error("failed to request certificate from PCA: {0}")]
    Sign(#[source] ProvisionerError),
    #[error("failed to retrieve certificate from PCA: {0}")]
    Get(#[source] ProvisionerError),
    #[error("invalid certificate request: {0}")]
    InvalidRequest(String),
    #[error("Reconciliation failed: {0}")]
    ReconciliationFailed(#[from] anyhow::Error),
}

/// What the dispatcher should do with a request after a successful reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    /// Wait for the next change event
    None,
    /// Reconcile again immediately
    Now,
    /// Reconcile again after the delay
    After(Duration),
}

impl Requeue {
    /// Requeue after `delay`, collapsing a zero delay to [`Requeue::Now`]
    #[must_use]
    pub fn after(delay: Duration) -> Self {
        if delay.is_zero() {
            Requeue::Now
        } else {
            Requeue::After(delay)
        }
    }

    #[must_use]
    pub fn is_requeue(&self) -> bool {
        !matches!(self, Requeue::None)
    }

    /// kube-runtime action for this directive
    #[must_use]
    pub fn into_action(self) -> Action {
        match self {
            Requeue::None => Action::await_change(),
            Requeue::Now => Action::requeue(Duration::ZERO),
            Requeue::After(delay) => Action::requeue(delay),
        }
    }
}

/// Result of one successful reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub requeue: Requeue,
}

impl ReconcileOutcome {
    /// Nothing more to do until the request changes
    #[must_use]
    pub fn done() -> Self {
        Self {
            requeue: Requeue::None,
        }
    }

    #[must_use]
    pub fn requeue(requeue: Requeue) -> Self {
        Self { requeue }
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
    /// When the resource last failed, used to drop state of deleted resources
    pub last_error: Instant,
}

impl BackoffState {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
            last_error: Instant::now(),
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
        self.last_error = Instant::now();
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }

    /// No error for longer than `idle`, so nothing will requeue through it again
    #[must_use]
    pub fn is_stale(&self, now: Instant, idle: Duration) -> bool {
        now.saturating_duration_since(self.last_error) > idle
    }
}

/// Shared reconciliation context
#[derive(Clone)]
pub struct Reconciler {
    pub requests: Arc<dyn CertificateRequestStore>,
    pub authorities: Arc<dyn AuthorityStore>,
    pub provisioners: Arc<ProvisionerCache>,
    pub events: Arc<dyn EventPublisher>,
    pub config: Arc<ControllerConfig>,
    // Backoff state per resource (identified by namespace/name)
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("provisioners", &self.provisioners)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        requests: Arc<dyn CertificateRequestStore>,
        authorities: Arc<dyn AuthorityStore>,
        provisioners: Arc<ProvisionerCache>,
        events: Arc<dyn EventPublisher>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            requests,
            authorities,
            provisioners,
            events,
            config: Arc::new(config),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_delay_requeues_now() {
        assert_eq!(Requeue::after(Duration::ZERO), Requeue::Now);
        assert_eq!(
            Requeue::after(Duration::from_secs(2)),
            Requeue::After(Duration::from_secs(2))
        );
        assert!(!Requeue::None.is_requeue());
        assert!(Requeue::Now.is_requeue());
    }

    #[test]
    fn test_requeue_maps_to_actions() {
        assert_eq!(Requeue::None.into_action(), Action::await_change());
        assert_eq!(
            Requeue::After(Duration::from_secs(5)).into_action(),
            Action::requeue(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_backoff_state_reset() {
        let mut state = BackoffState::new(5, 300);
        state.increment_error();
        state.increment_error();
        assert_eq!(state.backoff.next_backoff_seconds(), 5);
        state.reset();
        assert_eq!(state.error_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_state_goes_stale_without_errors() {
        let mut state = BackoffState::new(5, 300);
        state.increment_error();
        let idle = Duration::from_secs(600);

        tokio::time::advance(Duration::from_secs(599)).await;
        assert!(!state.is_stale(Instant::now(), idle));

        state.increment_error();
        tokio::time::advance(Duration::from_secs(599)).await;
        assert!(!state.is_stale(Instant::now(), idle));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(state.is_stale(Instant::now(), idle));
    }
}
