//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.
//! This module handles reconciliation errors and watch stream errors.

use crate::controller::reconciler::{BackoffState, Reconciler, ReconcilerError};
use crate::crd::CertificateRequest;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

fn resource_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

/// Next backoff for a resource, advancing its Fibonacci sequence
///
/// Entries that have not failed for twice the maximum backoff belong to requests
/// that were deleted or recovered without a reset, and are dropped here.
pub fn next_backoff(ctx: &Reconciler, namespace: &str, name: &str) -> (Duration, u32) {
    let key = resource_key(namespace, name);
    let idle = Duration::from_secs(ctx.config.backoff_max_secs.saturating_mul(2));
    let now = Instant::now();

    let mut states = ctx
        .backoff_states
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    let before = states.len();
    states.retain(|k, state| *k == key || !state.is_stale(now, idle));
    if states.len() < before {
        debug!(pruned = before - states.len(), "Dropped stale backoff state");
    }

    let state = states
        .entry(key)
        .or_insert_with(|| BackoffState::new(ctx.config.backoff_min_secs, ctx.config.backoff_max_secs));
    state.increment_error();
    (state.backoff.next_backoff(), state.error_count)
}

/// Forget the backoff state of a resource after a successful reconciliation
pub fn reset_backoff(ctx: &Reconciler, namespace: &str, name: &str) {
    let mut states = ctx
        .backoff_states
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if states.remove(&resource_key(namespace, name)).is_some() {
        debug!(resource.namespace = namespace, resource.name = name, "Reset error backoff");
    }
}

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per resource so one failing request does not slow
/// down retries of the others.
pub fn handle_reconciliation_error(
    obj: Arc<CertificateRequest>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.reconciliation_error",
        resource.name = name.as_str(),
        resource.namespace = namespace.as_str(),
        error = %error
    );
    let _error_guard = error_span.enter();

    let (backoff, error_count) = next_backoff(&ctx, &namespace, &name);

    error!("Reconciliation error for {}/{}: {}", namespace, name, error);
    info!(
        "Retrying in {}s (error count: {}, trigger source: error-backoff)",
        backoff.as_secs(),
        error_count
    );

    Action::requeue(backoff)
}

/// Watch stream error classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    Unauthorized,
    ResourceVersionExpired,
    TooManyRequests,
    NotFound,
    Other,
}

/// Classify a watch stream error by its rendered message
#[must_use]
pub fn classify_watch_error(error_string: &str) -> WatchErrorKind {
    // 404 first: a plain-text 404 body surfaces as a serde error mentioning WatchFailed
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    if (error_string.contains("401") || error_string.contains("Unauthorized")) && !is_not_found {
        return WatchErrorKind::Unauthorized;
    }
    if error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone")
    {
        return WatchErrorKind::ResourceVersionExpired;
    }
    if error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests")
    {
        return WatchErrorKind::TooManyRequests;
    }
    if is_not_found {
        return WatchErrorKind::NotFound;
    }
    WatchErrorKind::Other
}

/// Handle watch stream errors with appropriate classification and backoff
///
/// Returns `None` to filter out the error (allow restart) or `Some(())` to continue.
pub async fn handle_watch_stream_error(
    error_string: &str,
    backoff_ms: &AtomicU64,
    max_backoff_ms: u64,
    watch_restart_delay: Duration,
) -> Option<()> {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        error = %error_string
    );
    let _error_guard = error_span.enter();

    match classify_watch_error(error_string) {
        WatchErrorKind::Unauthorized => {
            error!("Watch authentication failed (401 Unauthorized), RBAC may have been revoked or the token expired");
            error!("Check that the controller ServiceAccount can list and watch certificaterequests.cert-manager.io");
            warn!(
                "Waiting {}s before retrying watch",
                watch_restart_delay.as_secs()
            );
            tokio::time::sleep(watch_restart_delay).await;
            None
        }
        WatchErrorKind::ResourceVersionExpired => {
            warn!(error_type = "410", "watch.error.resource_version_expired");
            None
        }
        WatchErrorKind::TooManyRequests => {
            let current = backoff_ms.load(Ordering::Relaxed);
            warn!(
                "API server storage reinitializing (429), backing off for {}ms before restart",
                current
            );
            tokio::time::sleep(Duration::from_millis(current)).await;
            backoff_ms.store(current.saturating_mul(2).min(max_backoff_ms), Ordering::Relaxed);
            None
        }
        WatchErrorKind::NotFound => {
            warn!(
                "Resource not found (404), normal for deleted requests. Error: {}",
                error_string
            );
            Some(())
        }
        WatchErrorKind::Other => {
            error!("Controller stream error: {}", error_string);
            tokio::time::sleep(watch_restart_delay).await;
            None
        }
    }
}
