//! # Status Projection
//!
//! Turns a reconciliation decision into the CertificateRequest status block.
//!
//! Projection is pure: it takes the current status and returns the next one.
//! Writing it (and publishing the matching event) is the engine's job.

use crate::crd::{reasons, CertificateRequestStatus, Condition, ConditionStatus};
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};

/// One status decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: ConditionStatus,
    pub reason: &'static str,
    pub message: String,
    /// Issued certificate (PEM), only with reason Issued
    pub certificate: Option<Vec<u8>>,
    /// Issuing CA (PEM), only with reason Issued
    pub ca: Option<Vec<u8>>,
}

impl StatusUpdate {
    #[must_use]
    pub fn pending(message: impl Into<String>) -> Self {
        Self {
            status: ConditionStatus::False,
            reason: reasons::PENDING,
            message: message.into(),
            certificate: None,
            ca: None,
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: ConditionStatus::False,
            reason: reasons::FAILED,
            message: message.into(),
            certificate: None,
            ca: None,
        }
    }

    #[must_use]
    pub fn issued(certificate: Vec<u8>, ca: Vec<u8>) -> Self {
        Self {
            status: ConditionStatus::True,
            reason: reasons::ISSUED,
            message: "certificate issued".to_string(),
            certificate: Some(certificate),
            ca: Some(ca),
        }
    }

    /// Warning-worthy (Ready=False)
    #[must_use]
    pub fn is_warning(&self) -> bool {
        self.status == ConditionStatus::False
    }
}

fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn is_issued(status: &CertificateRequestStatus) -> bool {
    status.conditions.iter().any(|c| {
        c.is_ready_type()
            && c.status == ConditionStatus::True
            && c.reason.as_deref() == Some(reasons::ISSUED)
    })
}

/// Apply `update` to `current`
///
/// - fields other than the Ready condition, `failureTime`, `certificate` and `ca` are kept
/// - `lastTransitionTime` only moves when the condition status changes
/// - `failureTime` is stamped the first time the request fails
/// - an Issued status is returned unchanged: its payload never regresses
#[must_use]
pub fn project(
    current: Option<&CertificateRequestStatus>,
    update: &StatusUpdate,
    now: DateTime<Utc>,
) -> CertificateRequestStatus {
    let mut next = current.cloned().unwrap_or_default();
    if is_issued(&next) {
        return next;
    }

    let previous = next.conditions.iter().position(Condition::is_ready_type);
    let last_transition_time = previous
        .map(|i| &next.conditions[i])
        .filter(|c| c.status == update.status)
        .and_then(|c| c.last_transition_time.clone())
        .unwrap_or_else(|| timestamp(now));

    let mut condition = Condition::ready(update.status, update.reason, &update.message);
    condition.last_transition_time = Some(last_transition_time);
    match previous {
        Some(i) => next.conditions[i] = condition,
        None => next.conditions.push(condition),
    }

    if update.reason == reasons::FAILED && next.failure_time.is_none() {
        next.failure_time = Some(timestamp(now));
    }

    if update.reason == reasons::ISSUED {
        if let Some(certificate) = &update.certificate {
            next.certificate = Some(encode(certificate));
        }
        if let Some(ca) = &update.ca {
            next.ca = Some(encode(ca));
        }
    }

    next
}
