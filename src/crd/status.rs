//! # Conditions
//!
//! Condition types shared by CertificateRequest and the issuer resources.

use serde::{Deserialize, Serialize};

/// Condition type carried by every resource this controller reads or writes
pub const CONDITION_READY: &str = "Ready";

/// Reasons cert-manager understands on a CertificateRequest Ready condition
pub mod reasons {
    /// Issuance has not finished yet
    pub const PENDING: &str = "Pending";
    /// Certificate and CA are stored on the request
    pub const ISSUED: &str = "Issued";
    /// Issuance failed and will not be retried for this request
    pub const FAILED: &str = "Failed";
}

/// Status of a condition (True, False, Unknown)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, schemars::JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl ConditionStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,
    /// Last transition time (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
    /// Machine-readable reason for the condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Condition {
    /// Ready condition with the given status and reason
    #[must_use]
    pub fn ready(status: ConditionStatus, reason: &str, message: &str) -> Self {
        Self {
            r#type: CONDITION_READY.to_string(),
            status,
            last_transition_time: None,
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
        }
    }

    #[must_use]
    pub fn is_ready_type(&self) -> bool {
        self.r#type == CONDITION_READY
    }
}

/// Find the Ready condition in a list of conditions
#[must_use]
pub fn find_ready_condition(conditions: &[Condition]) -> Option<&Condition> {
    conditions.iter().find(|c| c.is_ready_type())
}
